//! System reward pool.
//!
//! A shared native-value pool fed by swept dust, relayer dues, redirected
//! payouts and direct funding. Other components draw from it internally;
//! operators can claim from it directly.

use cosmwasm_std::{
    Addr, BankMsg, Coin, DepsMut, Event, MessageInfo, Order, Response, StdResult, Storage, Uint128,
};
use cw_storage_plus::{Item, Map};

use crate::address_codec::local_from_bytes;
use crate::app::FailReason;
use crate::error::ContractError;
use crate::apps::gov_hub::ParamResult;
use crate::payout::must_pay;
use crate::state::CONFIG;

/// Pool balance in the native denom
pub const SYSTEM_REWARD_POOL: Item<Uint128> = Item::new("system_reward_pool");

/// Accounts allowed to claim from the pool
pub const OPERATORS: Map<&Addr, bool> = Map::new("system_reward_operators");

pub fn pool_balance(storage: &dyn Storage) -> StdResult<Uint128> {
    Ok(SYSTEM_REWARD_POOL
        .may_load(storage)?
        .unwrap_or_default())
}

/// Credit `amount` to the pool.
pub fn credit(storage: &mut dyn Storage, amount: Uint128) -> Result<(), ContractError> {
    if amount.is_zero() {
        return Ok(());
    }
    let balance = pool_balance(storage)?.checked_add(amount)?;
    SYSTEM_REWARD_POOL.save(storage, &balance)?;
    Ok(())
}

/// Take up to `amount` out of the pool; returns what was actually taken.
pub fn claim(storage: &mut dyn Storage, amount: Uint128) -> StdResult<Uint128> {
    let balance = pool_balance(storage)?;
    let actual = amount.min(balance);
    SYSTEM_REWARD_POOL.save(storage, &(balance - actual))?;
    Ok(actual)
}

pub fn is_operator(storage: &dyn Storage, addr: &Addr) -> StdResult<bool> {
    Ok(OPERATORS.may_load(storage, addr)?.unwrap_or(false))
}

pub fn operators(storage: &dyn Storage) -> StdResult<Vec<Addr>> {
    OPERATORS
        .keys(storage, None, None, Order::Ascending)
        .collect()
}

// ============================================================================
// Execute
// ============================================================================

/// Add the attached native funds to the pool.
pub fn execute_fund_system_reward(
    deps: DepsMut,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let amount = must_pay(&info, &config.native_denom)?;
    credit(deps.storage, amount)?;

    Ok(Response::new()
        .add_attribute("method", "fund_system_reward")
        .add_event(
            Event::new("receive_deposit")
                .add_attribute("from", info.sender)
                .add_attribute("amount", amount),
        ))
}

/// Pay up to `amount` from the pool to `to`. Operators only.
pub fn execute_claim_system_reward(
    deps: DepsMut,
    info: MessageInfo,
    to: String,
    amount: Uint128,
) -> Result<Response, ContractError> {
    if !is_operator(deps.storage, &info.sender)? {
        return Err(ContractError::NotOperator);
    }
    let to = deps.api.addr_validate(&to)?;
    let config = CONFIG.load(deps.storage)?;

    let actual = claim(deps.storage, amount)?;
    let mut response = Response::new()
        .add_attribute("method", "claim_system_reward")
        .add_attribute("to", to.as_str())
        .add_attribute("amount", actual);

    if actual.is_zero() {
        response = response.add_event(Event::new("reward_empty"));
    } else {
        response = response
            .add_message(BankMsg::Send {
                to_address: to.to_string(),
                amount: vec![Coin {
                    denom: config.native_denom,
                    amount: actual,
                }],
            })
            .add_event(
                Event::new("reward_to")
                    .add_attribute("to", to)
                    .add_attribute("amount", actual),
            );
    }

    Ok(response)
}

// ============================================================================
// Governance
// ============================================================================

/// `addOperator` / `deleteOperator`; the value is the operator's canonical address.
pub fn update_param(deps: DepsMut, key: &str, value: &[u8]) -> Result<ParamResult, ContractError> {
    let add = match key {
        "addOperator" => true,
        "deleteOperator" => false,
        _ => return Ok(Err(FailReason::UnknownParam)),
    };
    let operator = match local_from_bytes(deps.api, value) {
        Ok(addr) => addr,
        Err(_) => return Ok(Err(FailReason::LengthMismatch)),
    };

    if add {
        OPERATORS.save(deps.storage, &operator, &true)?;
    } else {
        OPERATORS.remove(deps.storage, &operator);
    }
    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    #[test]
    fn test_claim_is_capped_by_balance() {
        let mut storage = MockStorage::new();
        assert_eq!(claim(&mut storage, Uint128::new(10)).unwrap(), Uint128::zero());

        credit(&mut storage, Uint128::new(100)).unwrap();
        credit(&mut storage, Uint128::new(50)).unwrap();
        assert_eq!(pool_balance(&storage).unwrap(), Uint128::new(150));

        assert_eq!(claim(&mut storage, Uint128::new(40)).unwrap(), Uint128::new(40));
        assert_eq!(claim(&mut storage, Uint128::new(1000)).unwrap(), Uint128::new(110));
        assert_eq!(pool_balance(&storage).unwrap(), Uint128::zero());
    }
}
