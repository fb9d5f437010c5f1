//! Query handlers for the cross-chain contract.

use cosmwasm_std::{Binary, Deps, Order, StdResult};

use common::channel::channel_name;
use common::ChannelId;

use crate::apps::token_hub::bind::{BindRequest, BIND_REQUESTS};
use crate::apps::token_hub::lock::{large_transfer_limit, LockInfo, LOCKS};
use crate::apps::token_hub::{self, BOUND_TOKENS, TOKEN_HUB_PARAMS};
use crate::apps::validator_set::maintenance::maintaining;
use crate::apps::validator_set::slash::{self, Indicator, SLASH_PARAMS};
use crate::apps::validator_set::{
    self, deprecated_incoming, load_validators, Validator, VALIDATOR_SET_PARAMS,
};
use crate::breaker;
use crate::msg::{
    AmountResponse, BoundTokenResponse, BreakerStatusResponse, CabinetResponse, ChannelResponse,
    ChannelsResponse, MaintainingResponse, OperatorsResponse, ParamsResponse, RelayerRoundResponse,
    RelayerWeight, ValidatorsResponse,
};
use crate::relayer_hub::{Relayer, RELAYERS, RELAYER_HUB_PARAMS};
use crate::relayer_incentive::{
    self, RoundSummary, INCENTIVE_PARAMS, ROUND_SUMMARIES, ROUND_WEIGHTS,
};
use crate::state::{ChannelConfig, Config, CHANNELS, CONFIG, SEND_QUEUE};
use crate::system_reward;

// ============================================================================
// Core Queries
// ============================================================================

pub fn query_config(deps: Deps) -> StdResult<Config> {
    CONFIG.load(deps.storage)
}

fn channel_response(channel_id: ChannelId, channel: ChannelConfig) -> ChannelResponse {
    ChannelResponse {
        channel_id,
        name: channel_name(channel_id).to_string(),
        app: channel.app,
        relay_fee: channel.relay_fee,
        from_system_reward: channel.from_system_reward,
        send_sequence: channel.send_sequence,
        receive_sequence: channel.receive_sequence,
    }
}

pub fn query_channel(deps: Deps, channel_id: ChannelId) -> StdResult<ChannelResponse> {
    let channel = CHANNELS.load(deps.storage, channel_id)?;
    Ok(channel_response(channel_id, channel))
}

pub fn query_channels(deps: Deps) -> StdResult<ChannelsResponse> {
    let channels = CHANNELS
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(id, channel)| channel_response(id, channel)))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(ChannelsResponse { channels })
}

pub fn query_outgoing_package(
    deps: Deps,
    channel_id: ChannelId,
    sequence: u64,
) -> StdResult<Option<Binary>> {
    SEND_QUEUE.may_load(deps.storage, (channel_id, sequence))
}

// ============================================================================
// Breaker & Validators
// ============================================================================

pub fn query_breaker_status(deps: Deps) -> StdResult<BreakerStatusResponse> {
    let state = breaker::load_state(deps.storage)?;
    let reopen_approvals =
        breaker::approval_count(deps.storage, &breaker::reopen_proposal(state.reopen_round))?;
    Ok(BreakerStatusResponse {
        suspended: state.suspended,
        reopen_round: state.reopen_round,
        suspended_at: state.suspended_at,
        reopen_approvals,
    })
}

pub fn query_cabinet(deps: Deps) -> StdResult<CabinetResponse> {
    Ok(CabinetResponse {
        members: validator_set::cabinet(deps.storage)?,
    })
}

pub fn query_validators(deps: Deps) -> StdResult<ValidatorsResponse> {
    Ok(ValidatorsResponse {
        validators: load_validators(deps.storage)?,
    })
}

pub fn query_validator(deps: Deps, consensus_addr: String) -> StdResult<Option<Validator>> {
    let consensus_addr = deps.api.addr_validate(&consensus_addr)?;
    Ok(load_validators(deps.storage)?
        .into_iter()
        .find(|v| v.consensus_addr == consensus_addr))
}

pub fn query_deprecated_incoming(deps: Deps) -> StdResult<AmountResponse> {
    Ok(AmountResponse {
        amount: deprecated_incoming(deps.storage)?,
    })
}

pub fn query_slash_indicator(deps: Deps, validator: String) -> StdResult<Indicator> {
    let validator = deps.api.addr_validate(&validator)?;
    slash::indicator(deps.storage, &validator)
}

pub fn query_maintaining(deps: Deps) -> StdResult<MaintainingResponse> {
    Ok(MaintainingResponse {
        validators: maintaining(deps.storage)?,
    })
}

// ============================================================================
// Relayers & System Reward
// ============================================================================

pub fn query_relayer_round(deps: Deps) -> StdResult<RelayerRoundResponse> {
    let round = relayer_incentive::current_round(deps.storage)?;
    let weights = ROUND_WEIGHTS
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(relayer, weight)| RelayerWeight { relayer, weight }))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(RelayerRoundResponse {
        sequence: round.sequence,
        count: round.count,
        total: round.total,
        weights,
    })
}

pub fn query_round_summary(deps: Deps, round: u64) -> StdResult<Option<RoundSummary>> {
    ROUND_SUMMARIES.may_load(deps.storage, round)
}

pub fn query_relayer_reward(deps: Deps, relayer: String) -> StdResult<AmountResponse> {
    let relayer = deps.api.addr_validate(&relayer)?;
    Ok(AmountResponse {
        amount: relayer_incentive::pending_reward(deps.storage, &relayer)?,
    })
}

pub fn query_relayer(deps: Deps, relayer: String) -> StdResult<Option<Relayer>> {
    let relayer = deps.api.addr_validate(&relayer)?;
    RELAYERS.may_load(deps.storage, &relayer)
}

pub fn query_system_reward_pool(deps: Deps) -> StdResult<AmountResponse> {
    Ok(AmountResponse {
        amount: system_reward::pool_balance(deps.storage)?,
    })
}

pub fn query_operators(deps: Deps) -> StdResult<OperatorsResponse> {
    Ok(OperatorsResponse {
        operators: system_reward::operators(deps.storage)?,
    })
}

// ============================================================================
// Token Hub
// ============================================================================

pub fn query_bind_request(deps: Deps, symbol: String) -> StdResult<Option<BindRequest>> {
    BIND_REQUESTS.may_load(deps.storage, &symbol)
}

pub fn query_bound_token(deps: Deps, token: String) -> StdResult<Option<BoundTokenResponse>> {
    let bound = match BOUND_TOKENS.may_load(deps.storage, &token)? {
        Some(bound) => bound,
        None => return Ok(None),
    };
    Ok(Some(BoundTokenResponse {
        large_transfer_limit: large_transfer_limit(deps.storage, &token)?,
        token,
        symbol: bound.symbol,
        decimals: bound.decimals,
    }))
}

pub fn query_locked_balance(deps: Deps, token: String) -> StdResult<AmountResponse> {
    Ok(AmountResponse {
        amount: token_hub::locked_balance(deps.storage, &token)?,
    })
}

pub fn query_lock_info(deps: Deps, token: String, recipient: String) -> StdResult<Option<LockInfo>> {
    let recipient = deps.api.addr_validate(&recipient)?;
    LOCKS.may_load(deps.storage, (token.as_str(), &recipient))
}

pub fn query_collected_fees(deps: Deps) -> StdResult<AmountResponse> {
    Ok(AmountResponse {
        amount: token_hub::collected_fees(deps.storage)?,
    })
}

pub fn query_params(deps: Deps) -> StdResult<ParamsResponse> {
    Ok(ParamsResponse {
        validator_set: VALIDATOR_SET_PARAMS.load(deps.storage)?,
        slash: SLASH_PARAMS.load(deps.storage)?,
        relayer_incentive: INCENTIVE_PARAMS.load(deps.storage)?,
        token_hub: TOKEN_HUB_PARAMS.load(deps.storage)?,
        relayer_hub: RELAYER_HUB_PARAMS.load(deps.storage)?,
    })
}
