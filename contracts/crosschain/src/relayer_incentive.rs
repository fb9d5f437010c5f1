//! Relayer incentive rounds.
//!
//! Every accepted package contributes its relay fee to the open round and adds
//! one unit of weight to the relayer that delivered it. When the round holds
//! `round_size` contributions it closes: the total is split by weight (capped
//! at `maximum_weight` per relayer) into each participant's reward vault, and
//! the relayer whose contribution closed the round receives the rounding
//! remainder plus the dynamic extra incentive.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    Addr, DepsMut, Event, MessageInfo, Order, Response, StdResult, Storage, Uint128,
};
use cw_storage_plus::{Item, Map};

use crate::app::FailReason;
use crate::apps::gov_hub::{decode_u64_param, decode_uint_param};
use crate::apps::token_hub;
use crate::error::ContractError;
use crate::payout::pay_native;
use crate::state::CONFIG;
use crate::system_reward;

// ============================================================================
// Parameters
// ============================================================================

#[cw_serde]
pub struct IncentiveParams {
    /// Contributions per round
    pub round_size: u64,
    /// Weight cap per relayer per round
    pub maximum_weight: u64,
    /// Bonus for the relayer that closes a round, drawn from the system reward pool
    pub dynamic_extra_incentive: Uint128,
}

impl Default for IncentiveParams {
    fn default() -> Self {
        Self {
            round_size: 1000,
            maximum_weight: 400,
            dynamic_extra_incentive: Uint128::zero(),
        }
    }
}

impl IncentiveParams {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.round_size == 0 || self.maximum_weight == 0 || self.maximum_weight > self.round_size
        {
            return Err(ContractError::OutOfRange {
                reason: "need 0 < maximum_weight <= round_size".to_string(),
            });
        }
        Ok(())
    }

    /// Apply a governance update.
    pub fn update(&mut self, key: &str, value: &[u8]) -> Result<(), FailReason> {
        match key {
            "dynamicExtraIncentiveAmount" => {
                self.dynamic_extra_incentive = decode_uint_param(value)?;
            }
            "roundSize" => {
                let v = decode_u64_param(value)?;
                if v < self.maximum_weight {
                    return Err(FailReason::OutOfRange);
                }
                self.round_size = v;
            }
            "maximumWeight" => {
                let v = decode_u64_param(value)?;
                if v == 0 || v > self.round_size {
                    return Err(FailReason::OutOfRange);
                }
                self.maximum_weight = v;
            }
            _ => return Err(FailReason::UnknownParam),
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

/// The open round.
#[cw_serde]
#[derive(Default)]
pub struct Round {
    pub sequence: u64,
    /// Contributions so far
    pub count: u64,
    /// Value collected so far
    pub total: Uint128,
}

/// Outcome of a closed round.
#[cw_serde]
pub struct RoundSummary {
    pub total: Uint128,
    pub extra_incentive: Uint128,
    pub closer: Addr,
    pub participants: u32,
    pub total_weight: u64,
}

pub const INCENTIVE_PARAMS: Item<IncentiveParams> = Item::new("incentive_params");
pub const CURRENT_ROUND: Item<Round> = Item::new("current_round");
/// Weights of the open round
pub const ROUND_WEIGHTS: Map<&Addr, u64> = Map::new("round_weights");
pub const ROUND_SUMMARIES: Map<u64, RoundSummary> = Map::new("round_summaries");
/// Claimable rewards from closed rounds
pub const REWARD_VAULT: Map<&Addr, Uint128> = Map::new("relayer_reward_vault");

pub fn current_round(storage: &dyn Storage) -> StdResult<Round> {
    Ok(CURRENT_ROUND.may_load(storage)?.unwrap_or_default())
}

pub fn pending_reward(storage: &dyn Storage, relayer: &Addr) -> StdResult<Uint128> {
    Ok(REWARD_VAULT.may_load(storage, relayer)?.unwrap_or_default())
}

// ============================================================================
// Accumulation
// ============================================================================

/// Record one contribution by `relayer` worth up to `amount`.
///
/// The value is drawn from the system reward pool when `from_system` is set,
/// otherwise from the relay fees collected by the token hub. Only what is
/// actually available is added to the round.
pub fn add_reward(
    storage: &mut dyn Storage,
    relayer: &Addr,
    amount: Uint128,
    from_system: bool,
) -> Result<Vec<Event>, ContractError> {
    let params = INCENTIVE_PARAMS.load(storage)?;
    let actual = if from_system {
        system_reward::claim(storage, amount)?
    } else {
        token_hub::claim_collected_fees(storage, amount)?
    };

    let mut round = current_round(storage)?;
    round.total = round.total.checked_add(actual)?;
    round.count += 1;

    let weight = ROUND_WEIGHTS.may_load(storage, relayer)?.unwrap_or_default() + 1;
    ROUND_WEIGHTS.save(storage, relayer, &weight)?;

    if round.count < params.round_size {
        CURRENT_ROUND.save(storage, &round)?;
        return Ok(vec![]);
    }

    let event = close_round(storage, &params, round, relayer)?;
    Ok(vec![event])
}

fn close_round(
    storage: &mut dyn Storage,
    params: &IncentiveParams,
    round: Round,
    closer: &Addr,
) -> Result<Event, ContractError> {
    let weights = ROUND_WEIGHTS
        .range(storage, None, None, Order::Ascending)
        .collect::<StdResult<Vec<(Addr, u64)>>>()?;

    let shares = split_round(round.total, &weights, params.maximum_weight, closer);
    for (relayer, share) in &shares {
        credit_vault(storage, relayer, *share)?;
    }

    let extra_incentive = system_reward::claim(storage, params.dynamic_extra_incentive)?;
    credit_vault(storage, closer, extra_incentive)?;

    for (relayer, _) in &weights {
        ROUND_WEIGHTS.remove(storage, relayer);
    }

    let total_weight = weights
        .iter()
        .map(|(_, w)| (*w).min(params.maximum_weight))
        .sum();
    ROUND_SUMMARIES.save(
        storage,
        round.sequence,
        &RoundSummary {
            total: round.total,
            extra_incentive,
            closer: closer.clone(),
            participants: weights.len() as u32,
            total_weight,
        },
    )?;
    CURRENT_ROUND.save(
        storage,
        &Round {
            sequence: round.sequence + 1,
            count: 0,
            total: Uint128::zero(),
        },
    )?;

    Ok(Event::new("relayer_round_closed")
        .add_attribute("round", round.sequence.to_string())
        .add_attribute("total", round.total)
        .add_attribute("participants", weights.len().to_string())
        .add_attribute("closer", closer.as_str())
        .add_attribute("extra_incentive", extra_incentive))
}

/// Split `total` by capped weight. The remainder of the integer division goes
/// to `closer`, so the shares always sum to `total`.
pub fn split_round(
    total: Uint128,
    weights: &[(Addr, u64)],
    cap: u64,
    closer: &Addr,
) -> Vec<(Addr, Uint128)> {
    let total_weight: u64 = weights.iter().map(|(_, w)| (*w).min(cap)).sum();
    if total_weight == 0 {
        return vec![(closer.clone(), total)];
    }

    let mut shares: Vec<(Addr, Uint128)> = weights
        .iter()
        .map(|(relayer, w)| {
            (
                relayer.clone(),
                total.multiply_ratio((*w).min(cap), total_weight),
            )
        })
        .collect();

    let distributed: Uint128 = shares.iter().map(|(_, s)| *s).sum();
    let remainder = total - distributed;
    match shares.iter_mut().find(|(relayer, _)| relayer == closer) {
        Some((_, share)) => *share += remainder,
        None => shares.push((closer.clone(), remainder)),
    }
    shares
}

fn credit_vault(storage: &mut dyn Storage, relayer: &Addr, amount: Uint128) -> Result<(), ContractError> {
    if amount.is_zero() {
        return Ok(());
    }
    let balance = pending_reward(storage, relayer)?.checked_add(amount)?;
    REWARD_VAULT.save(storage, relayer, &balance)?;
    Ok(())
}

// ============================================================================
// Claim
// ============================================================================

/// Pay out everything `relayer` earned in closed rounds. Anyone may trigger it.
pub fn execute_claim_relayer_reward(
    deps: DepsMut,
    _info: MessageInfo,
    relayer: String,
) -> Result<Response, ContractError> {
    let relayer = deps.api.addr_validate(&relayer)?;
    let config = CONFIG.load(deps.storage)?;

    let reward = pending_reward(deps.storage, &relayer)?;
    if reward.is_zero() {
        return Err(ContractError::NoReward);
    }
    REWARD_VAULT.remove(deps.storage, &relayer);

    let payout = pay_native(
        deps.storage,
        &config.native_denom,
        &relayer,
        reward,
        "relayer_reward",
    )?;

    Ok(Response::new()
        .add_attribute("method", "claim_relayer_reward")
        .add_submessage(payout)
        .add_event(
            Event::new("relayer_reward_claimed")
                .add_attribute("relayer", relayer)
                .add_attribute("amount", reward),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    fn addr(name: &str) -> Addr {
        Addr::unchecked(name)
    }

    fn setup(round_size: u64, maximum_weight: u64, pool: u128) -> MockStorage {
        let mut storage = MockStorage::new();
        INCENTIVE_PARAMS
            .save(
                &mut storage,
                &IncentiveParams {
                    round_size,
                    maximum_weight,
                    dynamic_extra_incentive: Uint128::zero(),
                },
            )
            .unwrap();
        system_reward::credit(&mut storage, Uint128::new(pool)).unwrap();
        storage
    }

    #[test]
    fn test_split_is_monotonic_up_to_cap() {
        let weights: Vec<(Addr, u64)> = (1..=7).map(|w| (addr(&format!("r{}", w)), w)).collect();
        let shares = split_round(Uint128::new(1_000_000), &weights, 3, &addr("r1"));
        let share = |name: &str| {
            shares
                .iter()
                .find(|(a, _)| a.as_str() == name)
                .map(|(_, s)| *s)
                .unwrap()
        };

        // r1 also gets the remainder as closer; it is still below r2
        assert!(share("r1") < share("r2"));
        assert!(share("r2") < share("r3"));
        for capped in ["r4", "r5", "r6", "r7"] {
            assert_eq!(share(capped), share("r3"));
        }

        let sum: Uint128 = shares.iter().map(|(_, s)| *s).sum();
        assert_eq!(sum, Uint128::new(1_000_000));
    }

    #[test]
    fn test_round_closes_at_size() {
        let mut storage = setup(4, 3, 1_000);
        let alice = addr("alice");
        let bob = addr("bob");

        assert!(add_reward(&mut storage, &alice, Uint128::new(100), true)
            .unwrap()
            .is_empty());
        add_reward(&mut storage, &alice, Uint128::new(100), true).unwrap();
        add_reward(&mut storage, &alice, Uint128::new(100), true).unwrap();
        assert_eq!(current_round(&storage).unwrap().count, 3);

        let events = add_reward(&mut storage, &bob, Uint128::new(100), true).unwrap();
        assert_eq!(events[0].ty, "relayer_round_closed");

        // alice 3 of 4 weight, bob 1 of 4
        assert_eq!(pending_reward(&storage, &alice).unwrap(), Uint128::new(300));
        assert_eq!(pending_reward(&storage, &bob).unwrap(), Uint128::new(100));

        let round = current_round(&storage).unwrap();
        assert_eq!(round.sequence, 1);
        assert_eq!(round.count, 0);
        assert!(ROUND_WEIGHTS.is_empty(&storage));

        let summary = ROUND_SUMMARIES.load(&storage, 0).unwrap();
        assert_eq!(summary.total, Uint128::new(400));
        assert_eq!(summary.closer, bob);
    }

    #[test]
    fn test_reward_is_capped_by_pool() {
        let mut storage = setup(2, 2, 150);
        let alice = addr("alice");

        add_reward(&mut storage, &alice, Uint128::new(100), true).unwrap();
        add_reward(&mut storage, &alice, Uint128::new(100), true).unwrap();

        assert_eq!(pending_reward(&storage, &alice).unwrap(), Uint128::new(150));
        assert_eq!(system_reward::pool_balance(&storage).unwrap(), Uint128::zero());
    }

    #[test]
    fn test_closer_receives_extra_incentive() {
        let mut storage = setup(2, 1, 1_000);
        let mut params = INCENTIVE_PARAMS.load(&storage).unwrap();
        params.dynamic_extra_incentive = Uint128::new(50);
        INCENTIVE_PARAMS.save(&mut storage, &params).unwrap();

        let alice = addr("alice");
        let bob = addr("bob");
        add_reward(&mut storage, &alice, Uint128::new(10), true).unwrap();
        add_reward(&mut storage, &bob, Uint128::new(10), true).unwrap();

        assert_eq!(pending_reward(&storage, &alice).unwrap(), Uint128::new(10));
        assert_eq!(pending_reward(&storage, &bob).unwrap(), Uint128::new(60));
    }

    #[test]
    fn test_param_updates() {
        let mut params = IncentiveParams::default();
        let mut value = [0u8; 32];

        value[31] = 5;
        params.update("maximumWeight", &value).unwrap();
        assert_eq!(params.maximum_weight, 5);

        value[31] = 4;
        assert_eq!(
            params.update("roundSize", &value).unwrap_err(),
            FailReason::OutOfRange
        );
        assert_eq!(
            params.update("roundSize", &value[..31]).unwrap_err(),
            FailReason::LengthMismatch
        );
        assert_eq!(
            params.update("unknown", &value).unwrap_err(),
            FailReason::UnknownParam
        );
    }
}
