//! Relayer registration.
//!
//! Relayers lock an exact deposit to be allowed to submit packages. On exit
//! they get the deposit back minus the dues, which go to the system reward pool.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, DepsMut, Event, MessageInfo, Response, StdResult, Storage, Uint128};
use cw_storage_plus::{Item, Map};

use crate::app::FailReason;
use crate::error::ContractError;
use crate::apps::gov_hub::decode_uint_param;
use crate::payout::{paid_amount, pay_native};
use crate::state::CONFIG;
use crate::system_reward;

/// Relayer hub parameters
#[cw_serde]
pub struct RelayerHubParams {
    /// Exact native amount a relayer must lock to register
    pub required_deposit: Uint128,
    /// Part of the deposit kept on unregister
    pub dues: Uint128,
}

impl Default for RelayerHubParams {
    fn default() -> Self {
        Self {
            required_deposit: Uint128::new(100_000_000_000_000_000_000),
            dues: Uint128::new(100_000_000_000_000_000),
        }
    }
}

impl RelayerHubParams {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.dues.is_zero() || self.dues >= self.required_deposit {
            return Err(ContractError::OutOfRange {
                reason: "dues must be positive and below the required deposit".to_string(),
            });
        }
        Ok(())
    }

    /// Apply a governance update.
    pub fn update(&mut self, key: &str, value: &[u8]) -> Result<(), FailReason> {
        match key {
            "requiredDeposit" => {
                let v = decode_uint_param(value)?;
                if v <= Uint128::one() || v <= self.dues {
                    return Err(FailReason::OutOfRange);
                }
                self.required_deposit = v;
            }
            "dues" => {
                let v = decode_uint_param(value)?;
                if v.is_zero() || v >= self.required_deposit {
                    return Err(FailReason::OutOfRange);
                }
                self.dues = v;
            }
            _ => return Err(FailReason::UnknownParam),
        }
        Ok(())
    }
}

/// A registered relayer
#[cw_serde]
pub struct Relayer {
    pub deposit: Uint128,
    pub dues: Uint128,
}

pub const RELAYER_HUB_PARAMS: Item<RelayerHubParams> = Item::new("relayer_hub_params");
pub const RELAYERS: Map<&Addr, Relayer> = Map::new("relayers");

pub fn is_relayer(storage: &dyn Storage, addr: &Addr) -> StdResult<bool> {
    Ok(RELAYERS.has(storage, addr))
}

/// Register the sender with an exact deposit.
pub fn execute_register(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = RELAYER_HUB_PARAMS.load(deps.storage)?;

    if RELAYERS.has(deps.storage, &info.sender) {
        return Err(ContractError::AlreadyExists);
    }

    let deposit = paid_amount(&info, &config.native_denom)?;
    if deposit != params.required_deposit {
        return Err(ContractError::ValueMismatch {
            expected: params.required_deposit,
            got: deposit,
        });
    }

    RELAYERS.save(
        deps.storage,
        &info.sender,
        &Relayer {
            deposit,
            dues: params.dues,
        },
    )?;

    Ok(Response::new()
        .add_attribute("method", "register_relayer")
        .add_event(
            Event::new("relayer_register")
                .add_attribute("relayer", info.sender)
                .add_attribute("deposit", deposit),
        ))
}

/// Unregister the sender and refund deposit minus dues.
pub fn execute_unregister(deps: DepsMut, info: MessageInfo) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let relayer = RELAYERS
        .may_load(deps.storage, &info.sender)?
        .ok_or(ContractError::DoesNotExist)?;
    RELAYERS.remove(deps.storage, &info.sender);

    let refund = relayer.deposit.checked_sub(relayer.dues)?;
    system_reward::credit(deps.storage, relayer.dues)?;

    let mut response = Response::new()
        .add_attribute("method", "unregister_relayer")
        .add_event(
            Event::new("relayer_unregister")
                .add_attribute("relayer", info.sender.as_str())
                .add_attribute("refund", refund)
                .add_attribute("dues", relayer.dues),
        );
    if !refund.is_zero() {
        response = response.add_submessage(pay_native(
            deps.storage,
            &config.native_denom,
            &info.sender,
            refund,
            "relayer_unregister",
        )?);
    }

    Ok(response)
}
