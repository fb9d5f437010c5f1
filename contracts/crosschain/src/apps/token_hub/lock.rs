//! Large-transfer locks.
//!
//! A transfer-in at or above its token's limit is not paid out immediately.
//! It is parked per (token, recipient) until the lock period has passed, giving
//! the cabinet time to cancel it.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, DepsMut, Env, Event, MessageInfo, Response, StdResult, Storage, Uint128};
use cw_storage_plus::Map;

use super::{
    add_locked, ensure_token_owner, is_native, pay_token, validate_token, BOUND_TOKENS,
    LARGE_TRANSFER_LIMITS,
};
use crate::breaker;
use crate::error::ContractError;
use crate::hash::keccak256;
use crate::state::CONFIG;

#[cw_serde]
pub struct LockInfo {
    pub amount: Uint128,
    /// Block time after which the amount can be withdrawn
    pub unlock_at: u64,
}

/// Locks keyed by (token, recipient)
pub const LOCKS: Map<(&str, &Addr), LockInfo> = Map::new("large_transfer_locks");

pub fn large_transfer_limit(storage: &dyn Storage, token: &str) -> StdResult<Option<Uint128>> {
    LARGE_TRANSFER_LIMITS.may_load(storage, token)
}

/// Whether `amount` of `token` must go through a lock.
pub fn is_large_transfer(storage: &dyn Storage, token: &str, amount: Uint128) -> StdResult<bool> {
    Ok(match large_transfer_limit(storage, token)? {
        Some(limit) => !limit.is_zero() && amount >= limit,
        None => false,
    })
}

/// Add `amount` to the recipient's lock and restart its lock period.
pub fn lock_transfer(
    storage: &mut dyn Storage,
    token: &str,
    recipient: &Addr,
    amount: Uint128,
    unlock_at: u64,
) -> Result<LockInfo, ContractError> {
    let previous = LOCKS
        .may_load(storage, (token, recipient))?
        .map(|lock| lock.amount)
        .unwrap_or_default();
    let lock = LockInfo {
        amount: previous.checked_add(amount)?,
        unlock_at,
    };
    LOCKS.save(storage, (token, recipient), &lock)?;
    Ok(lock)
}

fn load_lock(storage: &dyn Storage, token: &str, recipient: &Addr) -> Result<LockInfo, ContractError> {
    LOCKS
        .may_load(storage, (token, recipient))?
        .ok_or_else(|| ContractError::NoLockedToken {
            recipient: recipient.to_string(),
        })
}

/// Proposal id of a cancel vote. Relocking the same pair yields a new id.
pub fn cancel_proposal(token: &str, recipient: &Addr, lock: &LockInfo) -> [u8; 32] {
    let mut preimage = b"cancel_transfer".to_vec();
    preimage.extend_from_slice(token.as_bytes());
    preimage.push(0);
    preimage.extend_from_slice(recipient.as_bytes());
    preimage.push(0);
    preimage.extend_from_slice(&lock.unlock_at.to_be_bytes());
    keccak256(&preimage)
}

// ============================================================================
// Execute
// ============================================================================

/// Pay out an expired lock. Anyone may call.
pub fn execute_withdraw_unlocked_token(
    deps: DepsMut,
    env: Env,
    token: String,
    recipient: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let token = validate_token(deps.api, &config, &token)?;
    let recipient = deps.api.addr_validate(&recipient)?;

    let lock = load_lock(deps.storage, &token, &recipient)?;
    if env.block.time.seconds() < lock.unlock_at {
        return Err(ContractError::StillLocked {
            unlock_at: lock.unlock_at,
        });
    }
    LOCKS.remove(deps.storage, (token.as_str(), &recipient));

    let payout = pay_token(
        deps.storage,
        &config,
        &token,
        &recipient,
        lock.amount,
        "large_transfer_unlocked",
    )?;

    Ok(Response::new()
        .add_attribute("method", "withdraw_unlocked_token")
        .add_submessage(payout)
        .add_event(
            Event::new("large_transfer_unlocked")
                .add_attribute("token", token)
                .add_attribute("recipient", recipient)
                .add_attribute("amount", lock.amount),
        ))
}

/// Approve cancelling a lock; the second distinct cabinet approval returns
/// the amount to the hub's locked balance.
pub fn execute_cancel_transfer(
    deps: DepsMut,
    info: MessageInfo,
    token: String,
    recipient: String,
) -> Result<Response, ContractError> {
    breaker::ensure_cabinet(deps.storage, &info.sender)?;

    let config = CONFIG.load(deps.storage)?;
    let token = validate_token(deps.api, &config, &token)?;
    let recipient = deps.api.addr_validate(&recipient)?;
    let lock = load_lock(deps.storage, &token, &recipient)?;

    let proposal = cancel_proposal(&token, &recipient, &lock);
    let approvals = breaker::approve(deps.storage, &proposal, &info.sender)?;

    let mut response = Response::new()
        .add_attribute("method", "cancel_transfer")
        .add_attribute("approver", info.sender.as_str())
        .add_attribute("approvals", approvals.to_string());

    if approvals >= breaker::REQUIRED_APPROVALS {
        breaker::clear(deps.storage, &proposal)?;
        LOCKS.remove(deps.storage, (token.as_str(), &recipient));
        add_locked(deps.storage, &token, lock.amount)?;

        response = response.add_event(
            Event::new("transfer_cancelled")
                .add_attribute("token", token)
                .add_attribute("recipient", recipient)
                .add_attribute("amount", lock.amount),
        );
    }

    Ok(response)
}

/// Set the large-transfer limit of a bound CW20 token, as its minter.
pub fn execute_set_large_transfer_limit(
    deps: DepsMut,
    info: MessageInfo,
    token: String,
    limit: Uint128,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let token = validate_token(deps.api, &config, &token)?;
    // The native limit is governed
    if is_native(&config, &token) {
        return Err(ContractError::NotTokenOwner);
    }
    if !BOUND_TOKENS.has(deps.storage, &token) {
        return Err(ContractError::TokenNotBound { token });
    }
    ensure_token_owner(&deps.querier, &token, &info.sender)?;

    LARGE_TRANSFER_LIMITS.save(deps.storage, &token, &limit)?;

    Ok(Response::new()
        .add_attribute("method", "set_large_transfer_limit")
        .add_attribute("token", token)
        .add_attribute("limit", limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    #[test]
    fn test_locks_accumulate_and_reset_unlock_time() {
        let mut storage = MockStorage::new();
        let bob = Addr::unchecked("bob");
        LARGE_TRANSFER_LIMITS
            .save(&mut storage, "abnb", &Uint128::new(10_000))
            .unwrap();

        assert!(!is_large_transfer(&storage, "abnb", Uint128::new(9_999)).unwrap());
        assert!(is_large_transfer(&storage, "abnb", Uint128::new(10_000)).unwrap());
        assert!(!is_large_transfer(&storage, "other", Uint128::new(1_000_000)).unwrap());

        lock_transfer(&mut storage, "abnb", &bob, Uint128::new(10_000), 100).unwrap();
        let lock = lock_transfer(&mut storage, "abnb", &bob, Uint128::new(20_000), 250).unwrap();
        assert_eq!(
            lock,
            LockInfo {
                amount: Uint128::new(30_000),
                unlock_at: 250,
            }
        );
    }

    #[test]
    fn test_cancel_proposal_tracks_lock() {
        let bob = Addr::unchecked("bob");
        let lock = LockInfo {
            amount: Uint128::new(1),
            unlock_at: 10,
        };
        let relocked = LockInfo {
            amount: Uint128::new(2),
            unlock_at: 20,
        };
        assert_ne!(
            cancel_proposal("abnb", &bob, &lock),
            cancel_proposal("abnb", &bob, &relocked)
        );
    }
}
