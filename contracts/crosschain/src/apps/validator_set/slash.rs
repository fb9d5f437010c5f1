//! Slash indicator.
//!
//! The block producer reports every validator that missed its turn. Each
//! report raises the validator's count; every `misdemeanor_threshold` reports
//! its incoming is shared among the rest of the set, and every
//! `felony_threshold` reports it is also removed from the set and a felony
//! package is sent on the slash channel. Counts decay at every rotation.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    Addr, Api, DepsMut, Env, Event, MessageInfo, Order, Response, StdResult, Storage, Uint128,
};
use cw_storage_plus::{Item, Map};
use rlp::RlpStream;

use common::channel::SLASH_CHANNEL_ID;

use super::{load_validators, maintenance, redistribute_incoming, VALIDATORS};
use crate::address_codec::local_to_bytes;
use crate::app::{Applied, CrossChainApp, FailReason, Outcome, PackageContext};
use crate::apps::gov_hub::decode_u64_param;
use crate::codec::{append_bytes, append_uint};
use crate::error::ContractError;
use crate::registry;
use crate::state::{Config, CHANNELS, CONFIG};

/// Share of `felony_threshold` forgiven at every rotation is `1 / DECREASE_RATE`.
pub const DECREASE_RATE: u64 = 4;

#[cw_serde]
pub struct SlashParams {
    pub misdemeanor_threshold: u64,
    pub felony_threshold: u64,
}

impl Default for SlashParams {
    fn default() -> Self {
        Self {
            misdemeanor_threshold: 50,
            felony_threshold: 150,
        }
    }
}

impl SlashParams {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.misdemeanor_threshold == 0
            || self.misdemeanor_threshold >= self.felony_threshold
            || self.felony_threshold > 1_000
        {
            return Err(ContractError::OutOfRange {
                reason: "need 0 < misdemeanor_threshold < felony_threshold <= 1000".to_string(),
            });
        }
        Ok(())
    }

    pub fn update(&mut self, key: &str, value: &[u8]) -> Result<(), FailReason> {
        match key {
            "misdemeanorThreshold" => {
                let v = decode_u64_param(value)?;
                if v == 0 || v >= self.felony_threshold {
                    return Err(FailReason::OutOfRange);
                }
                self.misdemeanor_threshold = v;
            }
            "felonyThreshold" => {
                let v = decode_u64_param(value)?;
                if v > 1_000 || v <= self.misdemeanor_threshold {
                    return Err(FailReason::OutOfRange);
                }
                self.felony_threshold = v;
            }
            _ => return Err(FailReason::UnknownParam),
        }
        Ok(())
    }
}

/// Reports against one validator.
#[cw_serde]
#[derive(Default)]
pub struct Indicator {
    /// Block height of the last report
    pub height: u64,
    pub count: u64,
}

pub const SLASH_PARAMS: Item<SlashParams> = Item::new("slash_params");
pub const INDICATORS: Map<&Addr, Indicator> = Map::new("slash_indicators");

pub fn indicator(storage: &dyn Storage, validator: &Addr) -> StdResult<Indicator> {
    Ok(INDICATORS.may_load(storage, validator)?.unwrap_or_default())
}

// ============================================================================
// Slash
// ============================================================================

/// Record a missed turn for `validator`. System account only, once per block.
pub fn execute_slash(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    validator: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.system_account {
        return Err(ContractError::NotSystemAccount);
    }
    let validator = deps.api.addr_validate(&validator)?;

    let mut record = indicator(deps.storage, &validator)?;
    if record.count > 0 && record.height >= env.block.height {
        return Err(ContractError::AlreadySlashed {
            validator: validator.to_string(),
        });
    }
    record.height = env.block.height;
    record.count += 1;
    INDICATORS.save(deps.storage, &validator, &record)?;

    let params = SLASH_PARAMS.load(deps.storage)?;
    let mut events = vec![Event::new("validator_slashed")
        .add_attribute("validator", validator.as_str())
        .add_attribute("count", record.count.to_string())];
    if record.count % params.felony_threshold == 0 {
        events.extend(felony(deps.storage, deps.api, &env, &config, &validator)?);
    } else if record.count % params.misdemeanor_threshold == 0 {
        events.extend(misdemeanor(deps.storage, &env, &validator, true)?);
    }

    Ok(Response::new()
        .add_attribute("method", "slash")
        .add_attribute("validator", validator)
        .add_events(events))
}

/// Share the validator's incoming among the rest of the set and, when
/// `enter_maintenance` is set, move it into maintenance if it may enter.
pub fn misdemeanor(
    storage: &mut dyn Storage,
    env: &Env,
    validator: &Addr,
    enter_maintenance: bool,
) -> Result<Vec<Event>, ContractError> {
    let mut validators = load_validators(storage)?;
    let index = match validators.iter().position(|v| &v.consensus_addr == validator) {
        Some(index) => index,
        None => return Ok(vec![]),
    };
    let amount = redistribute_incoming(storage, &mut validators, index)?;
    VALIDATORS.save(storage, &validators)?;

    let mut event = Event::new("validator_misdemeanor")
        .add_attribute("validator", validator.as_str())
        .add_attribute("amount", amount);
    if enter_maintenance {
        let entered = maintenance::try_enter(storage, validator, env.block.height)?;
        event = event.add_attribute("maintenance", entered.to_string());
    }
    Ok(vec![event])
}

/// Share the validator's incoming, drop it from the set and report the felony
/// to the other chain. The last validator is never removed.
pub fn felony(
    storage: &mut dyn Storage,
    api: &dyn Api,
    env: &Env,
    config: &Config,
    validator: &Addr,
) -> Result<Vec<Event>, ContractError> {
    let mut validators = load_validators(storage)?;
    let index = match validators.iter().position(|v| &v.consensus_addr == validator) {
        Some(index) => index,
        None => return Ok(vec![]),
    };
    if validators.len() == 1 {
        return Ok(vec![]);
    }
    let amount = redistribute_incoming(storage, &mut validators, index)?;
    validators.remove(index);
    VALIDATORS.save(storage, &validators)?;
    maintenance::remove(storage, validator)?;

    let mut events = vec![Event::new("validator_felony")
        .add_attribute("validator", validator.as_str())
        .add_attribute("amount", amount)];
    if CHANNELS.has(storage, SLASH_CHANNEL_ID) {
        let payload = felony_payload(api, env, config, validator)?;
        events.push(registry::send_syn_package(
            storage,
            SLASH_CHANNEL_ID,
            payload,
            Uint128::zero(),
        )?);
    }
    Ok(events)
}

/// Felony payload `[validator, height, srcChainId, timestamp]`.
fn felony_payload(
    api: &dyn Api,
    env: &Env,
    config: &Config,
    validator: &Addr,
) -> StdResult<Vec<u8>> {
    let mut stream = RlpStream::new_list(4);
    append_bytes(&mut stream, &local_to_bytes(api, validator)?);
    append_uint(&mut stream, env.block.height);
    append_uint(&mut stream, config.src_chain_id as u64);
    append_uint(&mut stream, env.block.time.seconds());
    Ok(stream.out().to_vec())
}

/// Forgive `felony_threshold / DECREASE_RATE` reports of every validator.
pub fn decay_indicators(storage: &mut dyn Storage) -> StdResult<()> {
    let params = SLASH_PARAMS.load(storage)?;
    let decrease = params.felony_threshold / DECREASE_RATE;
    let records = INDICATORS
        .range(storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<_>>>()?;
    for (validator, mut record) in records {
        if record.count > decrease {
            record.count -= decrease;
            INDICATORS.save(storage, &validator, &record)?;
        } else {
            INDICATORS.remove(storage, &validator);
        }
    }
    Ok(())
}

// ============================================================================
// Slash Channel
// ============================================================================

/// Serves the slash channel. Felony packages only travel outward, so only
/// their acknowledgements come back.
pub struct SlashApp;

impl CrossChainApp for SlashApp {
    fn handle_syn_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        _payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Err(FailReason::UnknownType.into()))
    }

    fn handle_ack_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Ok(Applied::new().add_event(
            Event::new("felony_acknowledged").add_attribute("payload", hex::encode(payload)),
        )))
    }

    fn handle_fail_ack_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Ok(Applied::new().add_event(
            Event::new("felony_failed").add_attribute("payload", hex::encode(payload)),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    #[test]
    fn test_threshold_bounds() {
        SlashParams::default().validate().unwrap();
        let params = SlashParams {
            misdemeanor_threshold: 150,
            felony_threshold: 150,
        };
        assert!(params.validate().is_err());

        let mut params = SlashParams::default();
        let value = |v: u128| cosmwasm_std::Uint256::from(v).to_be_bytes().to_vec();
        assert_eq!(
            params.update("misdemeanorThreshold", &value(150)).unwrap_err(),
            FailReason::OutOfRange
        );
        assert_eq!(
            params.update("felonyThreshold", &value(1_001)).unwrap_err(),
            FailReason::OutOfRange
        );
        params.update("felonyThreshold", &value(200)).unwrap();
        params.update("misdemeanorThreshold", &value(20)).unwrap();
        assert_eq!(params.felony_threshold, 200);
        assert_eq!(params.misdemeanor_threshold, 20);
    }

    #[test]
    fn test_decay_forgives_a_quarter_of_felony() {
        let mut storage = MockStorage::new();
        SLASH_PARAMS.save(&mut storage, &SlashParams::default()).unwrap();
        let low = Addr::unchecked("low");
        let high = Addr::unchecked("high");
        INDICATORS
            .save(&mut storage, &low, &Indicator { height: 1, count: 37 })
            .unwrap();
        INDICATORS
            .save(&mut storage, &high, &Indicator { height: 1, count: 60 })
            .unwrap();

        decay_indicators(&mut storage).unwrap();

        assert!(INDICATORS.may_load(&storage, &low).unwrap().is_none());
        assert_eq!(indicator(&storage, &high).unwrap().count, 23);
    }
}
