//! Light-client query interface.
//!
//! The light client is a separate contract that tracks source-chain headers.
//! The cross-chain contract only ever asks it two yes/no questions.

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::Binary;

#[cw_serde]
#[derive(QueryResponses)]
pub enum LightClientQueryMsg {
    /// Whether the header at `height` has been synced and finalized.
    #[returns(bool)]
    IsHeightFinalized { height: u64 },

    /// Whether `proof` proves `payload_hash` against the state root at `height`.
    #[returns(bool)]
    VerifyProof {
        height: u64,
        proof: Binary,
        payload_hash: Binary,
    },
}
