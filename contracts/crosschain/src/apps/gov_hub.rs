//! Parameter governance.
//!
//! Governance packages name a parameter key, its new value and the target
//! component by its well-known 20-byte address. Every failure is reported back
//! on the governance channel as `[code]`.

use common::channel::TRANSFER_OUT_CHANNEL_ID;
use cosmwasm_std::{DepsMut, Event, Storage, Uint128, Uint256};
use cw_storage_plus::Item;
use rlp::RlpStream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::address_codec::{parse_remote_address, REMOTE_ADDRESS_LEN};
use crate::app::{Applied, CrossChainApp, FailReason, Outcome, PackageContext, Rejected};
use crate::apps::token_hub;
use crate::apps::validator_set::slash::SLASH_PARAMS;
use crate::apps::validator_set::VALIDATOR_SET_PARAMS;
use crate::codec::{append_uint, decode_bytes, open_list};
use crate::error::ContractError;
use crate::registry;
use crate::relayer_hub::RELAYER_HUB_PARAMS;
use crate::relayer_incentive::INCENTIVE_PARAMS;
use crate::state::{AddressTable, AppKind, Component, CONFIG};
use crate::system_reward;

/// Outcome of a single parameter update.
pub type ParamResult = Result<(), FailReason>;

/// Decode a 32-byte big-endian parameter value.
pub fn decode_uint_param(value: &[u8]) -> Result<Uint128, FailReason> {
    let bytes: [u8; 32] = value.try_into().map_err(|_| FailReason::LengthMismatch)?;
    Uint128::try_from(Uint256::from_be_bytes(bytes)).map_err(|_| FailReason::OutOfRange)
}

pub fn decode_u64_param(value: &[u8]) -> Result<u64, FailReason> {
    let v = decode_uint_param(value)?;
    u64::try_from(v.u128()).map_err(|_| FailReason::OutOfRange)
}

/// Component addressed by `target`, if any.
pub fn resolve_target(table: &AddressTable, target: &[u8]) -> Option<Component> {
    if target.len() != REMOTE_ADDRESS_LEN {
        return None;
    }
    table
        .entries()
        .into_iter()
        .find(|(_, addr)| {
            parse_remote_address(addr)
                .map(|bytes| bytes.as_slice() == target)
                .unwrap_or(false)
        })
        .map(|(component, _)| component)
}

/// Load a params item, apply `f` and save only if it succeeded.
fn update_item<T>(
    storage: &mut dyn Storage,
    item: Item<T>,
    f: impl FnOnce(&mut T) -> ParamResult,
) -> Result<ParamResult, ContractError>
where
    T: Serialize + DeserializeOwned,
{
    let mut params = item.load(storage)?;
    if let Err(reason) = f(&mut params) {
        return Ok(Err(reason));
    }
    item.save(storage, &params)?;
    Ok(Ok(()))
}

/// Apply `key = value` on the component addressed by `target`.
pub fn apply_param(
    deps: DepsMut,
    key: &str,
    value: &[u8],
    target: &[u8],
) -> Result<ParamResult, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let component = match resolve_target(&config.address_table, target) {
        Some(component) => component,
        None => return Ok(Err(FailReason::UnknownTarget)),
    };

    match component {
        Component::ValidatorSet => {
            update_item(deps.storage, VALIDATOR_SET_PARAMS, |p| p.update(key, value))
        }
        Component::SlashIndicator => {
            update_item(deps.storage, SLASH_PARAMS, |p| p.update(key, value))
        }
        Component::RelayerIncentive => {
            update_item(deps.storage, INCENTIVE_PARAMS, |p| p.update(key, value))
        }
        Component::RelayerHub => {
            update_item(deps.storage, RELAYER_HUB_PARAMS, |p| p.update(key, value))
        }
        Component::SystemReward => system_reward::update_param(deps, key, value),
        Component::TokenHub => token_hub::update_param(deps, key, value),
        Component::CrossChain => update_cross_chain(deps, &config.address_table, key, value),
        Component::GovHub => Ok(Err(FailReason::UnknownParam)),
    }
}

/// `addOrUpdateChannel`, value `[channel][fromSystem][appAddr20]`.
fn update_cross_chain(
    deps: DepsMut,
    table: &AddressTable,
    key: &str,
    value: &[u8],
) -> Result<ParamResult, ContractError> {
    if key != "addOrUpdateChannel" {
        return Ok(Err(FailReason::UnknownParam));
    }
    if value.len() != 2 + REMOTE_ADDRESS_LEN {
        return Ok(Err(FailReason::LengthMismatch));
    }

    let channel_id = value[0];
    let from_system = value[1] != 0;
    let app = match resolve_target(table, &value[2..]) {
        Some(Component::ValidatorSet) => AppKind::ValidatorSet,
        Some(Component::TokenHub) => AppKind::TokenHub,
        Some(Component::GovHub) => AppKind::GovHub,
        Some(Component::SlashIndicator) => AppKind::Slash,
        _ => return Ok(Err(FailReason::OutOfRange)),
    };
    if channel_id == TRANSFER_OUT_CHANNEL_ID && app != AppKind::TokenHub {
        return Ok(Err(FailReason::OutOfRange));
    }

    registry::add_or_update_channel(deps.storage, channel_id, app, from_system)?;
    Ok(Ok(()))
}

fn fail_response(reason: &FailReason) -> Vec<u8> {
    let mut stream = RlpStream::new_list(1);
    append_uint(&mut stream, reason.code() as u64);
    stream.out().to_vec()
}

fn reject(reason: FailReason) -> Outcome {
    let response = fail_response(&reason);
    Err(Rejected::new(reason).with_response(response))
}

pub struct GovHubApp;

impl CrossChainApp for GovHubApp {
    fn handle_syn_package(
        &self,
        deps: DepsMut,
        _ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        let decoded = open_list(payload, 3).and_then(|rlp| {
            let key = decode_bytes(&rlp.at(0)?)?;
            let value = decode_bytes(&rlp.at(1)?)?;
            let target = decode_bytes(&rlp.at(2)?)?;
            Ok((key, value, target))
        });
        let (key, value, target) = match decoded {
            Ok(fields) => fields,
            Err(err) => return Ok(reject(err.into())),
        };
        let key = match String::from_utf8(key) {
            Ok(key) => key,
            Err(_) => return Ok(reject(FailReason::UnknownParam)),
        };

        if let Err(reason) = apply_param(deps, &key, &value, &target)? {
            return Ok(reject(reason));
        }

        Ok(Ok(Applied::new().add_event(
            Event::new("param_change")
                .add_attribute("key", key)
                .add_attribute("value", hex::encode(&value))
                .add_attribute("target", format!("0x{}", hex::encode(&target))),
        )))
    }

    fn handle_ack_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        _payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Err(FailReason::UnknownType.into()))
    }

    fn handle_fail_ack_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        _payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Err(FailReason::UnknownType.into()))
    }
}
