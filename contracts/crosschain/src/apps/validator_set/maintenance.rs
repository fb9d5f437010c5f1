//! Temporary maintenance.
//!
//! A validator may step out of block production once per validator set, as
//! long as fewer than `max_num_of_maintaining` validators are out already. On
//! exit it is charged one slash for every `working * maintain_slash_scale`
//! blocks it spent out, judged directly against the slash thresholds. Every
//! rotation ends all maintenance.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Api, DepsMut, Env, Event, MessageInfo, Response, StdResult, Storage};
use cw_storage_plus::{Item, Map};

use super::slash::{self, SLASH_PARAMS};
use super::{load_validators, VALIDATOR_SET_PARAMS};
use crate::error::ContractError;
use crate::state::{Config, CONFIG};

#[cw_serde]
pub struct Maintenance {
    pub validator: Addr,
    /// Block height at which the validator stepped out
    pub start_height: u64,
}

/// Validators currently out, in entry order
pub const MAINTAINING: Item<Vec<Maintenance>> = Item::new("maintaining");
/// Rotations seen so far
pub const SET_EPOCH: Item<u64> = Item::new("set_epoch");
/// Epoch in which each validator last entered maintenance
pub const LAST_ENTERED: Map<&Addr, u64> = Map::new("maintenance_last_entered");

pub fn maintaining(storage: &dyn Storage) -> StdResult<Vec<Maintenance>> {
    Ok(MAINTAINING.may_load(storage)?.unwrap_or_default())
}

fn epoch(storage: &dyn Storage) -> StdResult<u64> {
    Ok(SET_EPOCH.may_load(storage)?.unwrap_or_default())
}

/// Move `validator` into maintenance if it may enter. Returns whether it did.
pub fn try_enter(storage: &mut dyn Storage, validator: &Addr, height: u64) -> StdResult<bool> {
    let params = VALIDATOR_SET_PARAMS.load(storage)?;
    let mut current = maintaining(storage)?;
    let epoch = epoch(storage)?;

    let in_set = load_validators(storage)?
        .iter()
        .any(|v| &v.consensus_addr == validator);
    let allowed = in_set
        && current.len() < params.max_num_of_maintaining as usize
        && !current.iter().any(|m| &m.validator == validator)
        && LAST_ENTERED.may_load(storage, validator)? != Some(epoch);
    if !allowed {
        return Ok(false);
    }

    current.push(Maintenance {
        validator: validator.clone(),
        start_height: height,
    });
    MAINTAINING.save(storage, &current)?;
    LAST_ENTERED.save(storage, validator, &epoch)?;
    Ok(true)
}

/// Drop `validator` from maintenance without judging it.
pub fn remove(storage: &mut dyn Storage, validator: &Addr) -> StdResult<Option<Maintenance>> {
    let mut current = maintaining(storage)?;
    let position = current.iter().position(|m| &m.validator == validator);
    let removed = position.map(|i| current.remove(i));
    if removed.is_some() {
        MAINTAINING.save(storage, &current)?;
    }
    Ok(removed)
}

/// End `validator`'s maintenance and apply the penalty it earned.
pub fn exit(
    storage: &mut dyn Storage,
    api: &dyn Api,
    env: &Env,
    config: &Config,
    validator: &Addr,
) -> Result<Vec<Event>, ContractError> {
    let record = match remove(storage, validator)? {
        Some(record) => record,
        None => return Err(ContractError::NotInMaintenance),
    };

    let params = VALIDATOR_SET_PARAMS.load(storage)?;
    let set_size = load_validators(storage)?.len() as u64;
    let working = set_size
        .saturating_sub(maintaining(storage)?.len() as u64)
        .max(1);
    let blocks = env.block.height.saturating_sub(record.start_height);
    let slashes = blocks / working / params.maintain_slash_scale;

    let thresholds = SLASH_PARAMS.load(storage)?;
    let mut events = vec![Event::new("maintenance_exited")
        .add_attribute("validator", validator.as_str())
        .add_attribute("blocks", blocks.to_string())
        .add_attribute("slashes", slashes.to_string())];
    if slashes >= thresholds.felony_threshold {
        events.extend(slash::felony(storage, api, env, config, validator)?);
    } else if slashes >= thresholds.misdemeanor_threshold {
        events.extend(slash::misdemeanor(storage, env, validator, false)?);
    }
    Ok(events)
}

/// End every maintenance and open a new epoch. Runs at each rotation.
pub fn exit_all(
    storage: &mut dyn Storage,
    api: &dyn Api,
    env: &Env,
    config: &Config,
) -> Result<Vec<Event>, ContractError> {
    let mut events = vec![];
    for record in maintaining(storage)? {
        events.extend(exit(storage, api, env, config, &record.validator)?);
    }
    let next_epoch = epoch(storage)? + 1;
    SET_EPOCH.save(storage, &next_epoch)?;
    Ok(events)
}

pub fn execute_enter_maintenance(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    if !try_enter(deps.storage, &info.sender, env.block.height)? {
        return Err(ContractError::CannotEnterMaintenance);
    }
    Ok(Response::new()
        .add_attribute("method", "enter_maintenance")
        .add_event(
            Event::new("maintenance_entered")
                .add_attribute("validator", info.sender)
                .add_attribute("height", env.block.height.to_string()),
        ))
}

pub fn execute_exit_maintenance(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let events = exit(deps.storage, deps.api, &env, &config, &info.sender)?;
    Ok(Response::new()
        .add_attribute("method", "exit_maintenance")
        .add_events(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::validator_set::{Validator, ValidatorSetParams, VALIDATORS};
    use cosmwasm_std::testing::MockStorage;
    use cosmwasm_std::Uint128;

    fn setup(names: &[&str], max_num_of_maintaining: u32) -> MockStorage {
        let mut storage = MockStorage::new();
        let params = ValidatorSetParams {
            max_num_of_maintaining,
            ..ValidatorSetParams::default()
        };
        VALIDATOR_SET_PARAMS.save(&mut storage, &params).unwrap();
        let set = names
            .iter()
            .map(|name| Validator {
                consensus_addr: Addr::unchecked(*name),
                fee_addr: Addr::unchecked(*name),
                bsc_fee_addr: format!("0x{}", "11".repeat(20)),
                voting_power: 100,
                incoming: Uint128::zero(),
            })
            .collect::<Vec<_>>();
        VALIDATORS.save(&mut storage, &set).unwrap();
        storage
    }

    #[test]
    fn test_entry_rules() {
        let mut storage = setup(&["a", "b", "c"], 2);
        let a = Addr::unchecked("a");

        assert!(try_enter(&mut storage, &a, 10).unwrap());
        // Already in
        assert!(!try_enter(&mut storage, &a, 11).unwrap());
        // Not in the set
        assert!(!try_enter(&mut storage, &Addr::unchecked("z"), 11).unwrap());

        assert!(try_enter(&mut storage, &Addr::unchecked("b"), 11).unwrap());
        // Cap reached
        assert!(!try_enter(&mut storage, &Addr::unchecked("c"), 12).unwrap());

        // Once per epoch
        remove(&mut storage, &a).unwrap();
        assert!(!try_enter(&mut storage, &a, 13).unwrap());
        SET_EPOCH.save(&mut storage, &1).unwrap();
        assert!(try_enter(&mut storage, &a, 14).unwrap());
    }

    #[test]
    fn test_disabled_when_cap_is_zero() {
        let mut storage = setup(&["a", "b"], 0);
        assert!(!try_enter(&mut storage, &Addr::unchecked("a"), 1).unwrap());
    }
}
