//! Queries against the external light-client contract.

use cosmwasm_std::{Addr, Binary, QuerierWrapper};

use common::LightClientQueryMsg;

use crate::error::ContractError;

pub fn ensure_height_finalized(
    querier: &QuerierWrapper,
    light_client: &Addr,
    height: u64,
) -> Result<(), ContractError> {
    let finalized: bool = querier.query_wasm_smart(
        light_client,
        &LightClientQueryMsg::IsHeightFinalized { height },
    )?;
    if !finalized {
        return Err(ContractError::UnverifiedHeight { height });
    }
    Ok(())
}

pub fn ensure_proof_valid(
    querier: &QuerierWrapper,
    light_client: &Addr,
    height: u64,
    proof: Binary,
    payload_hash: [u8; 32],
) -> Result<(), ContractError> {
    let valid: bool = querier.query_wasm_smart(
        light_client,
        &LightClientQueryMsg::VerifyProof {
            height,
            proof,
            payload_hash: Binary::from(payload_hash.to_vec()),
        },
    )?;
    if !valid {
        return Err(ContractError::UnverifiedProof { height });
    }
    Ok(())
}
