//! Token hub.
//!
//! Binds local tokens to their counterparts on the other chain and moves value
//! across the bind, transfer-in and transfer-out channels. Everything sent out
//! is held as a per-token locked balance that transfer-ins and refunds draw
//! from.

pub mod bind;
pub mod lock;
pub mod transfer;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    to_json_binary, Addr, Api, DepsMut, MessageInfo, QuerierWrapper, StdResult, Storage, SubMsg,
    Uint128, WasmMsg,
};
use cw20::{Cw20ExecuteMsg, Cw20QueryMsg, MinterResponse};
use cw_storage_plus::{Item, Map};

use common::channel::{BIND_CHANNEL_ID, TRANSFER_IN_CHANNEL_ID, TRANSFER_OUT_CHANNEL_ID};

use crate::address_codec::{local_from_bytes, local_to_bytes};
use crate::app::{Applied, CrossChainApp, FailReason, Outcome, PackageContext};
use crate::apps::gov_hub::{decode_u64_param, decode_uint_param, ParamResult};
use crate::codec::{precision_unit, to_bridge_amount};
use crate::error::ContractError;
use crate::payout::{paid_amount, pay_native};
use crate::state::Config;

pub use transfer::emit_batch_native;

/// Upper bound of the large-transfer lock period
pub const MAX_LOCK_PERIOD: u64 = 7 * 24 * 60 * 60;

/// Minimum distance between now and a transfer-out expiry
pub const MIN_EXPIRE_TIME_GAP: u64 = 120;

// ============================================================================
// Parameters
// ============================================================================

#[cw_serde]
pub struct TokenHubParams {
    /// Fee per outgoing package, in the native denom
    pub relay_fee: Uint128,
    /// Seconds a large transfer stays locked
    pub large_transfer_lock_period: u64,
}

impl Default for TokenHubParams {
    fn default() -> Self {
        Self {
            relay_fee: Uint128::new(2_000_000_000_000_000),
            large_transfer_lock_period: 6 * 60 * 60,
        }
    }
}

impl TokenHubParams {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.large_transfer_lock_period > MAX_LOCK_PERIOD {
            return Err(ContractError::OutOfRange {
                reason: "large_transfer_lock_period is at most one week".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

/// A token bound to a counterpart on the other chain.
#[cw_serde]
pub struct BoundToken {
    pub symbol: String,
    pub decimals: u8,
}

pub const TOKEN_HUB_PARAMS: Item<TokenHubParams> = Item::new("token_hub_params");
/// Bindings keyed by token (the native denom or a CW20 address)
pub const BOUND_TOKENS: Map<&str, BoundToken> = Map::new("bound_tokens");
/// Symbol -> token
pub const TOKEN_SYMBOLS: Map<&str, String> = Map::new("token_symbols");
/// Value held for the other chain, per token
pub const LOCKED_BALANCES: Map<&str, Uint128> = Map::new("locked_balances");
/// Relay fees collected from transfer-outs, paid out to relayers
pub const COLLECTED_FEES: Item<Uint128> = Item::new("collected_relay_fees");
/// Per-token large-transfer limit; transfers at or above it are locked
pub const LARGE_TRANSFER_LIMITS: Map<&str, Uint128> = Map::new("large_transfer_limits");

pub fn locked_balance(storage: &dyn Storage, token: &str) -> StdResult<Uint128> {
    Ok(LOCKED_BALANCES.may_load(storage, token)?.unwrap_or_default())
}

pub fn add_locked(storage: &mut dyn Storage, token: &str, amount: Uint128) -> Result<(), ContractError> {
    let balance = locked_balance(storage, token)?.checked_add(amount)?;
    LOCKED_BALANCES.save(storage, token, &balance)?;
    Ok(())
}

/// Lower the locked balance. Returns false, changing nothing, when it holds
/// less than `amount`.
pub fn take_locked(storage: &mut dyn Storage, token: &str, amount: Uint128) -> StdResult<bool> {
    let balance = locked_balance(storage, token)?;
    if balance < amount {
        return Ok(false);
    }
    LOCKED_BALANCES.save(storage, token, &(balance - amount))?;
    Ok(true)
}

pub fn collected_fees(storage: &dyn Storage) -> StdResult<Uint128> {
    Ok(COLLECTED_FEES.may_load(storage)?.unwrap_or_default())
}

pub fn add_collected_fees(storage: &mut dyn Storage, amount: Uint128) -> Result<(), ContractError> {
    let total = collected_fees(storage)?.checked_add(amount)?;
    COLLECTED_FEES.save(storage, &total)?;
    Ok(())
}

/// Take up to `amount` out of the collected fees; returns what was taken.
pub fn claim_collected_fees(storage: &mut dyn Storage, amount: Uint128) -> StdResult<Uint128> {
    let total = collected_fees(storage)?;
    let actual = amount.min(total);
    COLLECTED_FEES.save(storage, &(total - actual))?;
    Ok(actual)
}

/// Bind the native denom to its remote symbol.
pub fn bind_native(storage: &mut dyn Storage, config: &Config) -> StdResult<()> {
    BOUND_TOKENS.save(
        storage,
        &config.native_denom,
        &BoundToken {
            symbol: config.native_symbol.clone(),
            decimals: config.native_decimals,
        },
    )?;
    TOKEN_SYMBOLS.save(storage, &config.native_symbol, &config.native_denom)
}

// ============================================================================
// Token Helpers
// ============================================================================

/// Convert to bridge decimals, dropping what does not survive the conversion.
pub fn floor_to_bridge(amount: Uint128, decimals: u8) -> Result<Uint128, ContractError> {
    let unit = precision_unit(decimals)?;
    to_bridge_amount(amount - amount % unit, decimals)
}

/// Fail unless the attached native funds equal `expected`.
pub fn ensure_exact_funds(
    info: &MessageInfo,
    config: &Config,
    expected: Uint128,
) -> Result<(), ContractError> {
    let got = paid_amount(info, &config.native_denom)?;
    if got != expected {
        return Err(ContractError::FeeMismatch { expected, got });
    }
    Ok(())
}

pub fn is_native(config: &Config, token: &str) -> bool {
    token == config.native_denom
}

/// Resolve user input to a token key: the native denom or a validated CW20 address.
pub fn validate_token(api: &dyn Api, config: &Config, token: &str) -> StdResult<String> {
    if is_native(config, token) {
        return Ok(token.to_string());
    }
    Ok(api.addr_validate(token)?.to_string())
}

/// Payload bytes of a token: empty for native, canonical address for CW20.
pub fn token_to_bytes(api: &dyn Api, config: &Config, token: &str) -> StdResult<Vec<u8>> {
    if is_native(config, token) {
        return Ok(vec![]);
    }
    local_to_bytes(api, &Addr::unchecked(token))
}

pub fn token_from_bytes(api: &dyn Api, config: &Config, bytes: &[u8]) -> StdResult<String> {
    if bytes.is_empty() {
        return Ok(config.native_denom.clone());
    }
    Ok(local_from_bytes(api, bytes)?.to_string())
}

/// Send `amount` of `token` out of the hub.
pub fn pay_token(
    storage: &mut dyn Storage,
    config: &Config,
    token: &str,
    recipient: &Addr,
    amount: Uint128,
    reason: &str,
) -> StdResult<SubMsg> {
    if is_native(config, token) {
        return pay_native(storage, &config.native_denom, recipient, amount, reason);
    }
    Ok(SubMsg::new(WasmMsg::Execute {
        contract_addr: token.to_string(),
        msg: to_json_binary(&Cw20ExecuteMsg::Transfer {
            recipient: recipient.to_string(),
            amount,
        })?,
        funds: vec![],
    }))
}

/// Fail unless `sender` is the CW20 minter of `token`.
pub fn ensure_token_owner(
    querier: &QuerierWrapper,
    token: &str,
    sender: &Addr,
) -> Result<(), ContractError> {
    let minter: Option<MinterResponse> =
        querier.query_wasm_smart(token, &Cw20QueryMsg::Minter {})?;
    match minter {
        Some(m) if m.minter == sender.as_str() => Ok(()),
        _ => Err(ContractError::NotTokenOwner),
    }
}

pub fn query_allowance(
    querier: &QuerierWrapper,
    token: &str,
    owner: &Addr,
    spender: &Addr,
) -> StdResult<Uint128> {
    let response: cw20::AllowanceResponse = querier.query_wasm_smart(
        token,
        &Cw20QueryMsg::Allowance {
            owner: owner.to_string(),
            spender: spender.to_string(),
        },
    )?;
    Ok(response.allowance)
}

// ============================================================================
// Governance
// ============================================================================

/// `relayFee`, `largeTransferLockPeriod`, and `largeTransferLimit` for the native denom.
pub fn update_param(deps: DepsMut, key: &str, value: &[u8]) -> Result<ParamResult, ContractError> {
    let mut params = TOKEN_HUB_PARAMS.load(deps.storage)?;
    match key {
        "relayFee" => match decode_uint_param(value) {
            Ok(v) => params.relay_fee = v,
            Err(reason) => return Ok(Err(reason)),
        },
        "largeTransferLockPeriod" => match decode_u64_param(value) {
            Ok(v) if v <= MAX_LOCK_PERIOD => params.large_transfer_lock_period = v,
            Ok(_) => return Ok(Err(FailReason::OutOfRange)),
            Err(reason) => return Ok(Err(reason)),
        },
        "largeTransferLimit" => {
            let limit = match decode_uint_param(value) {
                Ok(v) => v,
                Err(reason) => return Ok(Err(reason)),
            };
            let config = crate::state::CONFIG.load(deps.storage)?;
            LARGE_TRANSFER_LIMITS.save(deps.storage, &config.native_denom, &limit)?;
            return Ok(Ok(()));
        }
        _ => return Ok(Err(FailReason::UnknownParam)),
    }
    TOKEN_HUB_PARAMS.save(deps.storage, &params)?;
    Ok(Ok(()))
}

// ============================================================================
// Channel Application
// ============================================================================

pub struct TokenHubApp;

impl CrossChainApp for TokenHubApp {
    fn handle_syn_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        match ctx.channel_id {
            BIND_CHANNEL_ID => bind::handle_bind_package(deps, payload),
            TRANSFER_IN_CHANNEL_ID => transfer::handle_transfer_in(deps, ctx, payload),
            _ => Ok(Err(FailReason::UnknownType.into())),
        }
    }

    fn handle_ack_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        match ctx.channel_id {
            TRANSFER_OUT_CHANNEL_ID => transfer::handle_transfer_out_ack(deps, payload),
            // Status and refund packages need no follow-up
            _ => Ok(Ok(Applied::new())),
        }
    }

    fn handle_fail_ack_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        match ctx.channel_id {
            TRANSFER_OUT_CHANNEL_ID => transfer::handle_transfer_out_fail_ack(deps, payload),
            _ => Ok(Ok(Applied::new())),
        }
    }
}
