//! Circuit breaker.
//!
//! Any single cabinet member can halt all channels. Reopening, and other
//! emergency actions such as cancelling a locked transfer, need approvals
//! from two distinct cabinet members.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, DepsMut, Env, Event, MessageInfo, Order, Response, StdResult, Storage};
use cw_storage_plus::{Item, Map};

use crate::apps::validator_set::is_cabinet_member;
use crate::error::ContractError;
use crate::hash::keccak256;

/// Distinct cabinet approvals needed to execute a quorum proposal.
pub const REQUIRED_APPROVALS: u32 = 2;

#[cw_serde]
#[derive(Default)]
pub struct BreakerState {
    pub suspended: bool,
    /// Incremented every time the bridge reopens
    pub reopen_round: u64,
    /// Block time of the last suspension
    pub suspended_at: Option<u64>,
}

pub const BREAKER: Item<BreakerState> = Item::new("breaker");

/// Approvals keyed by (proposal id, approver)
pub const APPROVALS: Map<(&[u8], &Addr), bool> = Map::new("quorum_approvals");

pub fn load_state(storage: &dyn Storage) -> StdResult<BreakerState> {
    Ok(BREAKER.may_load(storage)?.unwrap_or_default())
}

pub fn ensure_active(storage: &dyn Storage) -> Result<(), ContractError> {
    if load_state(storage)?.suspended {
        return Err(ContractError::Suspended);
    }
    Ok(())
}

pub fn ensure_cabinet(storage: &dyn Storage, sender: &Addr) -> Result<(), ContractError> {
    if !is_cabinet_member(storage, sender)? {
        return Err(ContractError::NotCabinet);
    }
    Ok(())
}

// ============================================================================
// Quorum Proposals
// ============================================================================

/// Proposal id of the reopen vote for `round`.
pub fn reopen_proposal(round: u64) -> [u8; 32] {
    let mut preimage = b"reopen".to_vec();
    preimage.extend_from_slice(&round.to_be_bytes());
    keccak256(&preimage)
}

/// Record `approver`'s vote and return the number of distinct approvals.
pub fn approve(
    storage: &mut dyn Storage,
    proposal: &[u8; 32],
    approver: &Addr,
) -> Result<u32, ContractError> {
    let key = (proposal.as_slice(), approver);
    if APPROVALS.has(storage, key) {
        return Err(ContractError::AlreadyApproved);
    }
    APPROVALS.save(storage, key, &true)?;
    Ok(approval_count(storage, proposal)?)
}

pub fn approval_count(storage: &dyn Storage, proposal: &[u8; 32]) -> StdResult<u32> {
    Ok(APPROVALS
        .prefix(proposal.as_slice())
        .keys(storage, None, None, Order::Ascending)
        .count() as u32)
}

/// Drop every vote on `proposal`.
pub fn clear(storage: &mut dyn Storage, proposal: &[u8; 32]) -> StdResult<()> {
    let approvers = APPROVALS
        .prefix(proposal.as_slice())
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<Addr>>>()?;
    for approver in approvers {
        APPROVALS.remove(storage, (proposal.as_slice(), &approver));
    }
    Ok(())
}

// ============================================================================
// Execute
// ============================================================================

/// Halt every channel. One cabinet vote is enough.
pub fn execute_suspend(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    ensure_cabinet(deps.storage, &info.sender)?;

    let mut state = load_state(deps.storage)?;
    if state.suspended {
        return Err(ContractError::AlreadySuspended);
    }
    state.suspended = true;
    state.suspended_at = Some(env.block.time.seconds());
    BREAKER.save(deps.storage, &state)?;

    Ok(Response::new()
        .add_attribute("method", "suspend")
        .add_event(
            Event::new("breaker_suspended")
                .add_attribute("executor", info.sender)
                .add_attribute("reopen_round", state.reopen_round.to_string()),
        ))
}

/// Approve reopening; the second distinct approval reopens the bridge.
pub fn execute_reopen(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    ensure_cabinet(deps.storage, &info.sender)?;

    let mut state = load_state(deps.storage)?;
    if !state.suspended {
        return Err(ContractError::NotSuspended);
    }

    let proposal = reopen_proposal(state.reopen_round);
    let approvals = approve(deps.storage, &proposal, &info.sender)?;

    let mut response = Response::new()
        .add_attribute("method", "reopen")
        .add_attribute("approver", info.sender.as_str())
        .add_attribute("approvals", approvals.to_string());

    if approvals >= REQUIRED_APPROVALS {
        clear(deps.storage, &proposal)?;
        let round = state.reopen_round;
        let suspended_for = state
            .suspended_at
            .map(|at| env.block.time.seconds().saturating_sub(at))
            .unwrap_or_default();
        state.suspended = false;
        state.suspended_at = None;
        state.reopen_round += 1;
        BREAKER.save(deps.storage, &state)?;

        response = response.add_event(
            Event::new("breaker_reopened")
                .add_attribute("executor", info.sender)
                .add_attribute("reopen_round", round.to_string())
                .add_attribute("suspended_for", suspended_for.to_string()),
        );
    }

    Ok(response)
}
