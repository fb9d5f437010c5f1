//! Cross-chain contract - Entry Points
//!
//! Message handlers live with their component:
//! - `router` - package delivery
//! - `breaker` - suspend and reopen
//! - `apps/` - validator set and slashing, token hub, governance
//! - `relayer_hub`, `relayer_incentive`, `system_reward` - relayer economics

use common::channel::TRANSFER_OUT_CHANNEL_ID;
use cosmwasm_std::{
    entry_point, to_json_binary, Binary, Deps, DepsMut, Env, MessageInfo, Reply, Response,
    StdResult, Uint128,
};
use cw2::{get_contract_version, set_contract_version};

use crate::address_codec::{encode_remote_address, parse_remote_address};
use crate::apps::token_hub::bind::{
    execute_approve_bind, execute_expire_bind, execute_reject_bind,
};
use crate::apps::token_hub::lock::{
    execute_cancel_transfer, execute_set_large_transfer_limit, execute_withdraw_unlocked_token,
};
use crate::apps::token_hub::transfer::{execute_batch_transfer_out, execute_transfer_out};
use crate::apps::token_hub::{bind_native, LARGE_TRANSFER_LIMITS, TOKEN_HUB_PARAMS};
use crate::apps::validator_set::maintenance::{
    execute_enter_maintenance, execute_exit_maintenance, SET_EPOCH,
};
use crate::apps::validator_set::slash::{execute_slash, SLASH_PARAMS};
use crate::apps::validator_set::{
    execute_deposit, Validator, DEPRECATED_INCOMING, VALIDATORS, VALIDATOR_SET_PARAMS,
};
use crate::breaker::{execute_reopen, execute_suspend, BreakerState, BREAKER};
use crate::codec::{encode_symbol, precision_unit};
use crate::error::ContractError;
use crate::msg::{ExecuteMsg, GenesisParams, InstantiateMsg, MigrateMsg, QueryMsg};
use crate::payout::{handle_payout_reply, PAYOUT_REPLY_ID_OFFSET};
use crate::query::{
    query_bind_request, query_bound_token, query_breaker_status, query_cabinet, query_channel,
    query_channels, query_collected_fees, query_config, query_deprecated_incoming,
    query_lock_info, query_locked_balance, query_maintaining, query_operators,
    query_outgoing_package, query_params, query_relayer, query_relayer_reward,
    query_relayer_round, query_round_summary, query_slash_indicator, query_system_reward_pool,
    query_validator, query_validators,
};
use crate::relayer_hub::{execute_register, execute_unregister, RELAYER_HUB_PARAMS};
use crate::relayer_incentive::{
    execute_claim_relayer_reward, Round, CURRENT_ROUND, INCENTIVE_PARAMS,
};
use crate::router::execute_handle_package;
use crate::state::{
    default_channels, AppKind, ChannelConfig, Config, CHANNELS, CONFIG, CONTRACT_NAME, CONTRACT_VERSION,
};
use crate::system_reward::{
    execute_claim_system_reward, execute_fund_system_reward, OPERATORS, SYSTEM_REWARD_POOL,
};

// ============================================================================
// Instantiate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    let system_account = deps.api.addr_validate(&msg.system_account)?;
    let light_client = deps.api.addr_validate(&msg.light_client)?;

    let address_table = msg.address_table.unwrap_or_default();
    for (_, addr) in address_table.entries() {
        parse_remote_address(addr).map_err(|e| ContractError::InvalidAddress {
            reason: e.to_string(),
        })?;
    }
    precision_unit(msg.native_decimals)?;
    encode_symbol(&msg.native_symbol)?;

    let config = Config {
        system_account,
        light_client,
        src_chain_id: msg.src_chain_id,
        dest_chain_id: msg.dest_chain_id,
        native_denom: msg.native_denom,
        native_decimals: msg.native_decimals,
        native_symbol: msg.native_symbol,
        address_table,
    };
    CONFIG.save(deps.storage, &config)?;

    // Component parameters
    let params = msg.params.unwrap_or_default();
    let GenesisParams {
        validator_set,
        slash,
        relayer_incentive,
        token_hub,
        relayer_hub,
    } = params;
    let validator_set = validator_set.unwrap_or_default();
    let slash = slash.unwrap_or_default();
    let relayer_incentive = relayer_incentive.unwrap_or_default();
    let token_hub = token_hub.unwrap_or_default();
    let relayer_hub = relayer_hub.unwrap_or_default();
    validator_set.validate()?;
    slash.validate()?;
    relayer_incentive.validate()?;
    token_hub.validate()?;
    relayer_hub.validate()?;
    VALIDATOR_SET_PARAMS.save(deps.storage, &validator_set)?;
    SLASH_PARAMS.save(deps.storage, &slash)?;
    INCENTIVE_PARAMS.save(deps.storage, &relayer_incentive)?;
    TOKEN_HUB_PARAMS.save(deps.storage, &token_hub)?;
    RELAYER_HUB_PARAMS.save(deps.storage, &relayer_hub)?;

    // Channel table
    let channels = match msg.channels {
        Some(channels) => channels
            .into_iter()
            .map(|c| {
                (
                    c.channel_id,
                    ChannelConfig::new(c.app, c.relay_fee, c.from_system_reward),
                )
            })
            .collect(),
        None => default_channels(),
    };
    // Validator settlement batches leave through the token hub's outbound channel
    if !channels
        .iter()
        .any(|(id, c)| *id == TRANSFER_OUT_CHANNEL_ID && c.app == AppKind::TokenHub)
    {
        return Err(ContractError::OutOfRange {
            reason: format!(
                "channel {} must be routed to the token hub",
                TRANSFER_OUT_CHANNEL_ID
            ),
        });
    }
    for (channel_id, channel) in &channels {
        CHANNELS.save(deps.storage, *channel_id, channel)?;
    }

    // Genesis validator set
    if msg.validators.is_empty() {
        return Err(ContractError::EmptySet);
    }
    if msg.validators.len() > validator_set.max_num_of_validators as usize {
        return Err(ContractError::OutOfRange {
            reason: format!(
                "{} validators exceed the maximum of {}",
                msg.validators.len(),
                validator_set.max_num_of_validators
            ),
        });
    }
    let mut validators: Vec<Validator> = Vec::with_capacity(msg.validators.len());
    for genesis in msg.validators {
        let consensus_addr = deps.api.addr_validate(&genesis.consensus_addr)?;
        if validators.iter().any(|v| v.consensus_addr == consensus_addr) {
            return Err(ContractError::DuplicateValidator {
                consensus_addr: consensus_addr.to_string(),
            });
        }
        let bsc_fee_addr =
            parse_remote_address(&genesis.bsc_fee_addr).map_err(|e| ContractError::InvalidAddress {
                reason: e.to_string(),
            })?;
        validators.push(Validator {
            consensus_addr,
            fee_addr: deps.api.addr_validate(&genesis.fee_addr)?,
            bsc_fee_addr: encode_remote_address(&bsc_fee_addr),
            voting_power: genesis.voting_power,
            incoming: Uint128::zero(),
        });
    }
    let validator_count = validators.len();
    VALIDATORS.save(deps.storage, &validators)?;
    DEPRECATED_INCOMING.save(deps.storage, &Uint128::zero())?;
    SET_EPOCH.save(deps.storage, &0)?;

    for operator in &msg.system_reward_operators {
        let operator = deps.api.addr_validate(operator)?;
        OPERATORS.save(deps.storage, &operator, &true)?;
    }
    SYSTEM_REWARD_POOL.save(deps.storage, &Uint128::zero())?;

    bind_native(deps.storage, &config)?;
    if let Some(limit) = msg.native_large_transfer_limit {
        LARGE_TRANSFER_LIMITS.save(deps.storage, &config.native_denom, &limit)?;
    }

    BREAKER.save(deps.storage, &BreakerState::default())?;
    CURRENT_ROUND.save(deps.storage, &Round::default())?;

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("light_client", config.light_client)
        .add_attribute("native_denom", config.native_denom)
        .add_attribute("channel_count", channels.len().to_string())
        .add_attribute("validator_count", validator_count.to_string()))
}

// ============================================================================
// Execute
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        // Relay
        ExecuteMsg::HandlePackage {
            channel_id,
            payload,
            proof,
            height,
            sequence,
        } => execute_handle_package(deps, env, info, channel_id, payload, proof, height, sequence),

        // Cabinet
        ExecuteMsg::Suspend {} => execute_suspend(deps, env, info),
        ExecuteMsg::Reopen {} => execute_reopen(deps, env, info),
        ExecuteMsg::CancelTransfer { token, recipient } => {
            execute_cancel_transfer(deps, info, token, recipient)
        }

        // Validator set
        ExecuteMsg::Deposit { validator } => execute_deposit(deps, info, validator),
        ExecuteMsg::Slash { validator } => execute_slash(deps, env, info, validator),
        ExecuteMsg::EnterMaintenance {} => execute_enter_maintenance(deps, env, info),
        ExecuteMsg::ExitMaintenance {} => execute_exit_maintenance(deps, env, info),

        // Relayers
        ExecuteMsg::RegisterRelayer {} => execute_register(deps, info),
        ExecuteMsg::UnregisterRelayer {} => execute_unregister(deps, info),
        ExecuteMsg::ClaimRelayerReward { relayer } => {
            execute_claim_relayer_reward(deps, info, relayer)
        }

        // System reward
        ExecuteMsg::FundSystemReward {} => execute_fund_system_reward(deps, info),
        ExecuteMsg::ClaimSystemReward { to, amount } => {
            execute_claim_system_reward(deps, info, to, amount)
        }

        // Token hub
        ExecuteMsg::TransferOut {
            token,
            recipient,
            amount,
            expire_time,
        } => execute_transfer_out(deps, env, info, token, recipient, amount, expire_time),
        ExecuteMsg::BatchTransferOut {
            recipients,
            amounts,
            refund_addrs,
            expire_time,
        } => execute_batch_transfer_out(
            deps,
            env,
            info,
            recipients,
            amounts,
            refund_addrs,
            expire_time,
        ),
        ExecuteMsg::ApproveBind { symbol, token } => {
            execute_approve_bind(deps, env, info, symbol, token)
        }
        ExecuteMsg::RejectBind { symbol, token } => execute_reject_bind(deps, info, symbol, token),
        ExecuteMsg::ExpireBind { symbol } => execute_expire_bind(deps, env, info, symbol),
        ExecuteMsg::WithdrawUnlockedToken { token, recipient } => {
            execute_withdraw_unlocked_token(deps, env, token, recipient)
        }
        ExecuteMsg::SetLargeTransferLimit { token, limit } => {
            execute_set_large_transfer_limit(deps, info, token, limit)
        }
    }
}

// ============================================================================
// Query
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => to_json_binary(&query_config(deps)?),
        QueryMsg::Channel { channel_id } => to_json_binary(&query_channel(deps, channel_id)?),
        QueryMsg::Channels {} => to_json_binary(&query_channels(deps)?),
        QueryMsg::OutgoingPackage {
            channel_id,
            sequence,
        } => to_json_binary(&query_outgoing_package(deps, channel_id, sequence)?),

        // Breaker & validators
        QueryMsg::BreakerStatus {} => to_json_binary(&query_breaker_status(deps)?),
        QueryMsg::Cabinet {} => to_json_binary(&query_cabinet(deps)?),
        QueryMsg::Validators {} => to_json_binary(&query_validators(deps)?),
        QueryMsg::Validator { consensus_addr } => {
            to_json_binary(&query_validator(deps, consensus_addr)?)
        }
        QueryMsg::DeprecatedIncoming {} => to_json_binary(&query_deprecated_incoming(deps)?),
        QueryMsg::SlashIndicator { validator } => {
            to_json_binary(&query_slash_indicator(deps, validator)?)
        }
        QueryMsg::Maintaining {} => to_json_binary(&query_maintaining(deps)?),

        // Relayers & system reward
        QueryMsg::RelayerRound {} => to_json_binary(&query_relayer_round(deps)?),
        QueryMsg::RoundSummary { round } => to_json_binary(&query_round_summary(deps, round)?),
        QueryMsg::RelayerReward { relayer } => {
            to_json_binary(&query_relayer_reward(deps, relayer)?)
        }
        QueryMsg::Relayer { relayer } => to_json_binary(&query_relayer(deps, relayer)?),
        QueryMsg::SystemRewardPool {} => to_json_binary(&query_system_reward_pool(deps)?),
        QueryMsg::Operators {} => to_json_binary(&query_operators(deps)?),

        // Token hub
        QueryMsg::BindRequest { symbol } => to_json_binary(&query_bind_request(deps, symbol)?),
        QueryMsg::BoundToken { token } => to_json_binary(&query_bound_token(deps, token)?),
        QueryMsg::LockedBalance { token } => to_json_binary(&query_locked_balance(deps, token)?),
        QueryMsg::LockInfo { token, recipient } => {
            to_json_binary(&query_lock_info(deps, token, recipient)?)
        }
        QueryMsg::CollectedFees {} => to_json_binary(&query_collected_fees(deps)?),
        QueryMsg::Params {} => to_json_binary(&query_params(deps)?),
    }
}

// ============================================================================
// Reply
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn reply(deps: DepsMut, _env: Env, msg: Reply) -> Result<Response, ContractError> {
    if msg.id >= PAYOUT_REPLY_ID_OFFSET {
        return handle_payout_reply(deps, msg);
    }
    Err(ContractError::UnknownReply { id: msg.id })
}

// ============================================================================
// Migrate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response, ContractError> {
    let stored = get_contract_version(deps.storage)?;
    if stored.contract != CONTRACT_NAME {
        return Err(ContractError::InvalidMigration {
            contract: stored.contract,
            version: stored.version,
        });
    }
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    Ok(Response::new()
        .add_attribute("action", "migrate")
        .add_attribute("from_version", stored.version)
        .add_attribute("version", CONTRACT_VERSION))
}
