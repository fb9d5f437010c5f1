//! Token binding.
//!
//! The other chain proposes a binding through a bind package. The local token
//! owner then approves it (locking `total_supply - peggy_amount` in the hub),
//! rejects it, or lets it expire. Each outcome is reported back on the bind
//! channel as `[status, symbol]`.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    to_json_binary, Addr, DepsMut, Env, Event, MessageInfo, Response, Storage, SubMsg, Uint128,
    WasmMsg,
};
use cw20::{Cw20ExecuteMsg, Cw20QueryMsg, TokenInfoResponse};
use cw_storage_plus::Map;
use rlp::RlpStream;

use common::channel::BIND_CHANNEL_ID;

use super::{
    add_collected_fees, add_locked, ensure_exact_funds, ensure_token_owner, floor_to_bridge,
    query_allowance, token_from_bytes, validate_token, BoundToken, BOUND_TOKENS, TOKEN_HUB_PARAMS,
    TOKEN_SYMBOLS,
};
use crate::app::{Applied, FailReason, Outcome};
use crate::codec::{
    append_bytes, append_uint, decode_bytes, decode_symbol, decode_u64, decode_uint128,
    encode_symbol, open_list,
};
use crate::error::ContractError;
use crate::registry;
use crate::state::{Config, CONFIG};

const BIND_TYPE_BIND: u64 = 0;
const BIND_TYPE_UNBIND: u64 = 1;

/// Status reported back to the other chain.
#[cw_serde]
#[derive(Copy, Eq)]
pub enum BindStatus {
    Success,
    Rejected,
    Timeout,
    SymbolMismatch,
    TotalSupplyMismatch,
    DecimalsMismatch,
}

impl BindStatus {
    pub fn code(self) -> u8 {
        match self {
            BindStatus::Success => 0,
            BindStatus::Rejected => 1,
            BindStatus::Timeout => 2,
            BindStatus::SymbolMismatch => 3,
            BindStatus::TotalSupplyMismatch => 4,
            BindStatus::DecimalsMismatch => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BindStatus::Success => "success",
            BindStatus::Rejected => "rejected",
            BindStatus::Timeout => "timeout",
            BindStatus::SymbolMismatch => "symbol_mismatch",
            BindStatus::TotalSupplyMismatch => "total_supply_mismatch",
            BindStatus::DecimalsMismatch => "decimals_mismatch",
        }
    }
}

/// A pending bind proposal.
#[cw_serde]
pub struct BindRequest {
    pub symbol: String,
    pub token: String,
    pub total_supply: Uint128,
    /// Supply already circulating on the other chain
    pub peggy_amount: Uint128,
    pub decimals: u8,
    pub expire_time: u64,
}

impl BindRequest {
    /// Amount the owner must lock in the hub.
    pub fn lock_amount(&self) -> Result<Uint128, ContractError> {
        Ok(self.total_supply.checked_sub(self.peggy_amount)?)
    }
}

/// Pending requests keyed by symbol
pub const BIND_REQUESTS: Map<&str, BindRequest> = Map::new("bind_requests");

fn load_request(storage: &dyn Storage, symbol: &str) -> Result<BindRequest, ContractError> {
    BIND_REQUESTS
        .may_load(storage, symbol)?
        .ok_or_else(|| ContractError::BindRequestNotFound {
            symbol: symbol.to_string(),
        })
}

/// Queue the status package and return its events.
fn send_status(
    storage: &mut dyn Storage,
    config: &Config,
    relay_fee: Uint128,
    request: &BindRequest,
    status: BindStatus,
) -> Result<Vec<Event>, ContractError> {
    let mut stream = RlpStream::new_list(2);
    append_uint(&mut stream, status.code() as u64);
    append_bytes(&mut stream, &encode_symbol(&request.symbol)?);

    let package = registry::send_syn_package(
        storage,
        BIND_CHANNEL_ID,
        stream.out().to_vec(),
        floor_to_bridge(relay_fee, config.native_decimals)?,
    )?;
    let event = Event::new(format!("bind_{}", status.as_str()))
        .add_attribute("symbol", &request.symbol)
        .add_attribute("token", &request.token);
    Ok(vec![event, package])
}

/// Close `request` with `status`, collecting the attached relay fee.
fn finish(
    storage: &mut dyn Storage,
    config: &Config,
    relay_fee: Uint128,
    request: &BindRequest,
    status: BindStatus,
) -> Result<Vec<Event>, ContractError> {
    BIND_REQUESTS.remove(storage, &request.symbol);
    add_collected_fees(storage, relay_fee)?;
    send_status(storage, config, relay_fee, request, status)
}

// ============================================================================
// Inbound
// ============================================================================

pub fn handle_bind_package(deps: DepsMut, payload: &[u8]) -> Result<Outcome, ContractError> {
    let decoded = open_list(payload, 7).and_then(|rlp| {
        Ok((
            decode_u64(&rlp.at(0)?)?,
            decode_symbol(&rlp.at(1)?)?,
            decode_bytes(&rlp.at(2)?)?,
            decode_uint128(&rlp.at(3)?)?,
            decode_uint128(&rlp.at(4)?)?,
            decode_u64(&rlp.at(5)?)?,
            decode_u64(&rlp.at(6)?)?,
        ))
    });
    let (bind_type, symbol, contract, total_supply, peggy_amount, decimals, expire_time) =
        match decoded {
            Ok(fields) => fields,
            Err(err) => return Ok(Err(FailReason::from(err).into())),
        };

    let config = CONFIG.load(deps.storage)?;
    if contract.is_empty() {
        return Ok(Err(FailReason::MalformedPayload("missing token address".to_string()).into()));
    }
    let token = match token_from_bytes(deps.api, &config, &contract) {
        Ok(token) => token,
        Err(err) => return Ok(Err(FailReason::MalformedPayload(err.to_string()).into())),
    };

    match bind_type {
        BIND_TYPE_BIND => {
            if BIND_REQUESTS.has(deps.storage, &symbol) {
                return Ok(Err(FailReason::BindPending.into()));
            }
            if TOKEN_SYMBOLS.has(deps.storage, &symbol) {
                return Ok(Err(FailReason::AlreadyBound.into()));
            }
            let decimals = match u8::try_from(decimals) {
                Ok(d) if peggy_amount <= total_supply => d,
                _ => return Ok(Err(FailReason::OutOfRange.into())),
            };

            BIND_REQUESTS.save(
                deps.storage,
                &symbol,
                &BindRequest {
                    symbol: symbol.clone(),
                    token: token.clone(),
                    total_supply,
                    peggy_amount,
                    decimals,
                    expire_time,
                },
            )?;
            Ok(Ok(Applied::new().add_event(
                Event::new("bind_requested")
                    .add_attribute("symbol", symbol)
                    .add_attribute("token", token)
                    .add_attribute("expire_time", expire_time.to_string()),
            )))
        }
        BIND_TYPE_UNBIND => {
            if symbol == config.native_symbol {
                return Ok(Err(FailReason::OutOfRange.into()));
            }
            let bound_to = TOKEN_SYMBOLS.may_load(deps.storage, &symbol)?;
            if bound_to.as_deref() != Some(token.as_str()) {
                return Ok(Ok(Applied::new()));
            }
            TOKEN_SYMBOLS.remove(deps.storage, &symbol);
            BOUND_TOKENS.remove(deps.storage, &token);
            Ok(Ok(Applied::new().add_event(
                Event::new("token_unbound")
                    .add_attribute("symbol", symbol)
                    .add_attribute("token", token),
            )))
        }
        _ => Ok(Err(FailReason::UnknownType.into())),
    }
}

// ============================================================================
// Execute
// ============================================================================

/// Approve a pending bind as the CW20 minter.
pub fn execute_approve_bind(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    symbol: String,
    token: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = TOKEN_HUB_PARAMS.load(deps.storage)?;
    ensure_exact_funds(&info, &config, params.relay_fee)?;
    let request = load_request(deps.storage, &symbol)?;

    let response = Response::new()
        .add_attribute("method", "approve_bind")
        .add_attribute("symbol", &symbol);

    if env.block.time.seconds() > request.expire_time {
        let events = finish(deps.storage, &config, params.relay_fee, &request, BindStatus::Timeout)?;
        return Ok(response.add_events(events));
    }

    let token = validate_token(deps.api, &config, &token)?;
    if token != request.token {
        return Err(ContractError::TokenMismatch {
            expected: request.token,
            got: token,
        });
    }
    ensure_token_owner(&deps.querier, &token, &info.sender)?;

    let lock_amount = request.lock_amount()?;
    let contract = env.contract.address;
    let allowance = query_allowance(&deps.querier, &token, &info.sender, &contract)?;
    if allowance != lock_amount {
        return Err(ContractError::AllowanceMismatch {
            expected: lock_amount,
            got: allowance,
        });
    }

    let token_info: TokenInfoResponse =
        deps.querier.query_wasm_smart(&token, &Cw20QueryMsg::TokenInfo {})?;
    let status = if token_info.symbol != request.symbol {
        BindStatus::SymbolMismatch
    } else if token_info.total_supply != request.total_supply {
        BindStatus::TotalSupplyMismatch
    } else if token_info.decimals != request.decimals {
        BindStatus::DecimalsMismatch
    } else {
        BindStatus::Success
    };

    let mut messages = vec![];
    if status == BindStatus::Success {
        BOUND_TOKENS.save(
            deps.storage,
            &token,
            &BoundToken {
                symbol: request.symbol.clone(),
                decimals: request.decimals,
            },
        )?;
        TOKEN_SYMBOLS.save(deps.storage, &request.symbol, &token)?;
        add_locked(deps.storage, &token, lock_amount)?;
        if !lock_amount.is_zero() {
            messages.push(transfer_from(&token, &info.sender, &contract, lock_amount)?);
        }
    }

    let events = finish(deps.storage, &config, params.relay_fee, &request, status)?;
    Ok(response
        .add_attribute("status", status.as_str())
        .add_submessages(messages)
        .add_events(events))
}

/// Reject a pending bind as the CW20 minter.
pub fn execute_reject_bind(
    deps: DepsMut,
    info: MessageInfo,
    symbol: String,
    token: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = TOKEN_HUB_PARAMS.load(deps.storage)?;
    ensure_exact_funds(&info, &config, params.relay_fee)?;
    let request = load_request(deps.storage, &symbol)?;

    let token = validate_token(deps.api, &config, &token)?;
    if token != request.token {
        return Err(ContractError::TokenMismatch {
            expected: request.token,
            got: token,
        });
    }
    ensure_token_owner(&deps.querier, &token, &info.sender)?;

    let events = finish(deps.storage, &config, params.relay_fee, &request, BindStatus::Rejected)?;
    Ok(Response::new()
        .add_attribute("method", "reject_bind")
        .add_attribute("symbol", symbol)
        .add_events(events))
}

/// Expire a pending bind once its expiry has passed. Anyone may call.
pub fn execute_expire_bind(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    symbol: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = TOKEN_HUB_PARAMS.load(deps.storage)?;
    ensure_exact_funds(&info, &config, params.relay_fee)?;
    let request = load_request(deps.storage, &symbol)?;

    if env.block.time.seconds() <= request.expire_time {
        return Err(ContractError::BindNotExpired { symbol });
    }

    let events = finish(deps.storage, &config, params.relay_fee, &request, BindStatus::Timeout)?;
    Ok(Response::new()
        .add_attribute("method", "expire_bind")
        .add_attribute("symbol", symbol)
        .add_events(events))
}

fn transfer_from(
    token: &str,
    owner: &Addr,
    recipient: &Addr,
    amount: Uint128,
) -> Result<SubMsg, ContractError> {
    Ok(SubMsg::new(WasmMsg::Execute {
        contract_addr: token.to_string(),
        msg: to_json_binary(&Cw20ExecuteMsg::TransferFrom {
            owner: owner.to_string(),
            recipient: recipient.to_string(),
            amount,
        })?,
        funds: vec![],
    }))
}
