//! Transfers across the bridge.
//!
//! Transfer-out locks value in the hub and queues a package on the
//! transfer-out channel. Transfer-in releases locked value, or parks it in a
//! large-transfer lock. Acks and fail-acks of transfer-outs refund the sender.

use cosmwasm_std::{
    to_json_binary, Addr, Api, DepsMut, Env, Event, MessageInfo, Response, Storage, SubMsg,
    Uint128, WasmMsg,
};
use cw20::Cw20ExecuteMsg;
use rlp::RlpStream;

use common::channel::TRANSFER_OUT_CHANNEL_ID;

use super::lock::{is_large_transfer, lock_transfer};
use super::{
    add_collected_fees, add_locked, ensure_exact_funds, floor_to_bridge, is_native, pay_token,
    query_allowance, take_locked, token_from_bytes, token_to_bytes, validate_token, BOUND_TOKENS,
    MIN_EXPIRE_TIME_GAP, TOKEN_HUB_PARAMS, TOKEN_SYMBOLS,
};
use crate::address_codec::{local_from_bytes, local_to_bytes, RemoteAddress};
use crate::app::{Applied, FailReason, Outcome, PackageContext, Rejected};
use crate::codec::{
    append_bytes, append_uint, decode_bytes, decode_list, decode_symbol, decode_u64,
    decode_uint128, encode_symbol, floor_to_bridge_wide, from_bridge_amount, open_list,
    to_bridge_amount, DecodeResult,
};
use crate::error::ContractError;
use crate::registry;
use crate::state::{Config, BRIDGE_DECIMALS, CONFIG};

// ============================================================================
// Payloads
// ============================================================================

/// Transfer-out payload. Amounts are in bridge decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutPackage {
    pub symbol: String,
    pub contract: Vec<u8>,
    pub amounts: Vec<Uint128>,
    pub recipients: Vec<RemoteAddress>,
    /// Local accounts refunded if the transfer fails, canonical bytes
    pub refund_addrs: Vec<Vec<u8>>,
    pub expire_time: u64,
}

impl TransferOutPackage {
    pub fn encode(&self) -> Result<Vec<u8>, ContractError> {
        let mut stream = RlpStream::new_list(6);
        append_bytes(&mut stream, &encode_symbol(&self.symbol)?);
        append_bytes(&mut stream, &self.contract);
        stream.begin_list(self.amounts.len());
        for amount in &self.amounts {
            append_uint(&mut stream, *amount);
        }
        stream.begin_list(self.recipients.len());
        for recipient in &self.recipients {
            append_bytes(&mut stream, recipient.as_bytes());
        }
        stream.begin_list(self.refund_addrs.len());
        for refund in &self.refund_addrs {
            append_bytes(&mut stream, refund);
        }
        append_uint(&mut stream, self.expire_time);
        Ok(stream.out().to_vec())
    }

    pub fn decode(payload: &[u8]) -> DecodeResult<Self> {
        let rlp = open_list(payload, 6)?;
        let recipients = decode_list(&rlp.at(3)?, |item| {
            RemoteAddress::from_slice(&decode_bytes(item)?)
                .map_err(|_| rlp::DecoderError::Custom("remote address must be 20 bytes"))
        })?;
        Ok(Self {
            symbol: decode_symbol(&rlp.at(0)?)?,
            contract: decode_bytes(&rlp.at(1)?)?,
            amounts: decode_list(&rlp.at(2)?, decode_uint128)?,
            recipients,
            refund_addrs: decode_list(&rlp.at(4)?, decode_bytes)?,
            expire_time: decode_u64(&rlp.at(5)?)?,
        })
    }
}

/// Transfer-in payload. The amount is in local decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferInPackage {
    pub symbol: String,
    pub contract: Vec<u8>,
    pub amount: Uint128,
    pub recipient: Vec<u8>,
    pub refund_addr: RemoteAddress,
    pub expire_time: u64,
}

impl TransferInPackage {
    pub fn encode(&self) -> Result<Vec<u8>, ContractError> {
        let mut stream = RlpStream::new_list(6);
        append_bytes(&mut stream, &encode_symbol(&self.symbol)?);
        append_bytes(&mut stream, &self.contract);
        append_uint(&mut stream, self.amount);
        append_bytes(&mut stream, &self.recipient);
        append_bytes(&mut stream, self.refund_addr.as_bytes());
        append_uint(&mut stream, self.expire_time);
        Ok(stream.out().to_vec())
    }

    pub fn decode(payload: &[u8]) -> DecodeResult<Self> {
        let rlp = open_list(payload, 6)?;
        let refund_addr = RemoteAddress::from_slice(&decode_bytes(&rlp.at(4)?)?)
            .map_err(|_| rlp::DecoderError::Custom("remote address must be 20 bytes"))?;
        Ok(Self {
            symbol: decode_symbol(&rlp.at(0)?)?,
            contract: decode_bytes(&rlp.at(1)?)?,
            amount: decode_uint128(&rlp.at(2)?)?,
            recipient: decode_bytes(&rlp.at(3)?)?,
            refund_addr,
            expire_time: decode_u64(&rlp.at(5)?)?,
        })
    }
}

/// Status carried by a transfer-in refund response.
pub fn refund_status(reason: &FailReason) -> u64 {
    match reason {
        FailReason::Timeout => 1,
        FailReason::UnboundToken => 2,
        FailReason::InsufficientBalance => 3,
        _ => 4,
    }
}

// ============================================================================
// Transfer Out
// ============================================================================

fn check_expire_time(env: &Env, expire_time: u64) -> Result<(), ContractError> {
    if expire_time < env.block.time.seconds() + MIN_EXPIRE_TIME_GAP {
        return Err(ContractError::InvalidExpireTime {
            min_seconds: MIN_EXPIRE_TIME_GAP,
        });
    }
    Ok(())
}

fn nonzero_bridge_amount(amount: Uint128, decimals: u8) -> Result<Uint128, ContractError> {
    let converted = to_bridge_amount(amount, decimals)?;
    if converted.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "amount must be positive".to_string(),
        });
    }
    Ok(converted)
}

/// Send `amount` of a bound token to `recipient` on the other chain.
#[allow(clippy::too_many_arguments)]
pub fn execute_transfer_out(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    token: String,
    recipient: String,
    amount: Uint128,
    expire_time: u64,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = TOKEN_HUB_PARAMS.load(deps.storage)?;

    let token = validate_token(deps.api, &config, &token)?;
    let bound = BOUND_TOKENS
        .may_load(deps.storage, &token)?
        .ok_or_else(|| ContractError::TokenNotBound {
            token: token.clone(),
        })?;
    check_expire_time(&env, expire_time)?;
    let remote = RemoteAddress::from_hex(&recipient).map_err(|e| ContractError::InvalidAddress {
        reason: e.to_string(),
    })?;
    let bridge_amount = nonzero_bridge_amount(amount, bound.decimals)?;

    let native = is_native(&config, &token);
    let expected_funds = if native {
        amount.checked_add(params.relay_fee)?
    } else {
        params.relay_fee
    };
    ensure_exact_funds(&info, &config, expected_funds)?;

    let mut messages = vec![];
    if !native {
        let contract = env.contract.address.clone();
        let available = query_allowance(&deps.querier, &token, &info.sender, &contract)?;
        if available < amount {
            return Err(ContractError::InsufficientAllowance {
                needed: amount,
                available,
            });
        }
        messages.push(SubMsg::new(WasmMsg::Execute {
            contract_addr: token.clone(),
            msg: to_json_binary(&Cw20ExecuteMsg::TransferFrom {
                owner: info.sender.to_string(),
                recipient: contract.to_string(),
                amount,
            })?,
            funds: vec![],
        }));
    }

    add_locked(deps.storage, &token, amount)?;
    add_collected_fees(deps.storage, params.relay_fee)?;

    let package = TransferOutPackage {
        symbol: bound.symbol,
        contract: token_to_bytes(deps.api, &config, &token)?,
        amounts: vec![bridge_amount],
        recipients: vec![remote],
        refund_addrs: vec![local_to_bytes(deps.api, &info.sender)?],
        expire_time,
    };
    let event = registry::send_syn_package(
        deps.storage,
        TRANSFER_OUT_CHANNEL_ID,
        package.encode()?,
        floor_to_bridge(params.relay_fee, config.native_decimals)?,
    )?;

    Ok(Response::new()
        .add_attribute("method", "transfer_out")
        .add_attribute("token", &token)
        .add_attribute("recipient", remote.to_hex())
        .add_attribute("amount", amount)
        .add_attribute("relay_fee", params.relay_fee)
        .add_submessages(messages)
        .add_event(event))
}

/// Send native value to several recipients in one package.
pub fn execute_batch_transfer_out(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    recipients: Vec<String>,
    amounts: Vec<Uint128>,
    refund_addrs: Vec<String>,
    expire_time: u64,
) -> Result<Response, ContractError> {
    if recipients.len() != amounts.len() || recipients.len() != refund_addrs.len() {
        return Err(ContractError::LengthMismatch {
            reason: format!(
                "{} recipients, {} amounts, {} refund addresses",
                recipients.len(),
                amounts.len(),
                refund_addrs.len()
            ),
        });
    }
    if recipients.is_empty() {
        return Err(ContractError::InvalidAmount {
            reason: "empty batch".to_string(),
        });
    }
    check_expire_time(&env, expire_time)?;

    let config = CONFIG.load(deps.storage)?;
    let params = TOKEN_HUB_PARAMS.load(deps.storage)?;

    let total = amounts
        .iter()
        .try_fold(Uint128::zero(), |acc, amount| acc.checked_add(*amount))?;
    let fees = params
        .relay_fee
        .checked_mul(Uint128::from(recipients.len() as u128))?;
    ensure_exact_funds(&info, &config, total.checked_add(fees)?)?;

    let bridge_amounts = amounts
        .iter()
        .map(|amount| nonzero_bridge_amount(*amount, config.native_decimals))
        .collect::<Result<Vec<_>, _>>()?;
    let remotes = recipients
        .iter()
        .map(|r| {
            RemoteAddress::from_hex(r).map_err(|e| ContractError::InvalidAddress {
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let refunds = refund_addrs
        .iter()
        .map(|r| {
            let addr = deps.api.addr_validate(r)?;
            local_to_bytes(deps.api, &addr)
        })
        .collect::<Result<Vec<_>, _>>()?;

    add_locked(deps.storage, &config.native_denom, total)?;
    add_collected_fees(deps.storage, fees)?;

    let package = TransferOutPackage {
        symbol: config.native_symbol.clone(),
        contract: vec![],
        amounts: bridge_amounts,
        recipients: remotes,
        refund_addrs: refunds,
        expire_time,
    };
    let event = registry::send_syn_package(
        deps.storage,
        TRANSFER_OUT_CHANNEL_ID,
        package.encode()?,
        floor_to_bridge(fees, config.native_decimals)?,
    )?;

    Ok(Response::new()
        .add_attribute("method", "batch_transfer_out")
        .add_attribute("count", recipients.len().to_string())
        .add_attribute("total", total)
        .add_event(event))
}

/// Lock native value the contract already holds and send it across in one
/// package. Used for the validator distribution batch, which carries no fee.
pub fn emit_batch_native(
    storage: &mut dyn Storage,
    api: &dyn Api,
    config: &Config,
    recipients: &[RemoteAddress],
    amounts: &[Uint128],
    refund_addrs: &[Addr],
    expire_time: u64,
) -> Result<Event, ContractError> {
    let total = amounts
        .iter()
        .try_fold(Uint128::zero(), |acc, amount| acc.checked_add(*amount))?;
    let bridge_amounts = amounts
        .iter()
        .map(|amount| to_bridge_amount(*amount, config.native_decimals))
        .collect::<Result<Vec<_>, _>>()?;
    let refunds = refund_addrs
        .iter()
        .map(|addr| local_to_bytes(api, addr))
        .collect::<Result<Vec<_>, _>>()?;

    add_locked(storage, &config.native_denom, total)?;

    let package = TransferOutPackage {
        symbol: config.native_symbol.clone(),
        contract: vec![],
        amounts: bridge_amounts,
        recipients: recipients.to_vec(),
        refund_addrs: refunds,
        expire_time,
    };
    registry::send_syn_package(
        storage,
        TRANSFER_OUT_CHANNEL_ID,
        package.encode()?,
        Uint128::zero(),
    )
}

// ============================================================================
// Refunds
// ============================================================================

/// Pay `amounts` (bridge decimals) of the token named by `contract` back to
/// `refund_addrs`, out of the locked balance.
fn refund(
    deps: DepsMut,
    contract: &[u8],
    amounts: &[Uint128],
    refund_addrs: &[Vec<u8>],
    status: &str,
) -> Result<Outcome, ContractError> {
    if amounts.len() != refund_addrs.len() {
        return Ok(Err(FailReason::MalformedPayload(
            "refund amounts and addresses differ in length".to_string(),
        )
        .into()));
    }
    let config = CONFIG.load(deps.storage)?;
    let token = match token_from_bytes(deps.api, &config, contract) {
        Ok(token) => token,
        Err(_) => return Ok(Err(FailReason::UnboundToken.into())),
    };
    let bound = match BOUND_TOKENS.may_load(deps.storage, &token)? {
        Some(bound) => bound,
        None => return Ok(Err(FailReason::UnboundToken.into())),
    };

    let mut payouts = Vec::with_capacity(amounts.len());
    let mut total = Uint128::zero();
    for (amount, raw_addr) in amounts.iter().zip(refund_addrs) {
        let local_amount = match from_bridge_amount(*amount, bound.decimals) {
            Ok(local_amount) => local_amount,
            Err(e) => return Ok(Err(FailReason::MalformedPayload(e.to_string()).into())),
        };
        let addr = match local_from_bytes(deps.api, raw_addr) {
            Ok(addr) => addr,
            Err(e) => return Ok(Err(FailReason::MalformedPayload(e.to_string()).into())),
        };
        total = match total.checked_add(local_amount) {
            Ok(total) => total,
            Err(e) => return Ok(Err(FailReason::MalformedPayload(e.to_string()).into())),
        };
        payouts.push((addr, local_amount));
    }

    if !take_locked(deps.storage, &token, total)? {
        return Ok(Err(FailReason::InsufficientBalance.into()));
    }

    let mut applied = Applied::new();
    for (addr, amount) in payouts {
        if amount.is_zero() {
            continue;
        }
        applied = applied.add_message(pay_token(
            deps.storage,
            &config,
            &token,
            &addr,
            amount,
            "transfer_out_refund",
        )?);
    }

    Ok(Ok(applied.add_event(
        Event::new("transfer_out_refund")
            .add_attribute("token", token)
            .add_attribute("amount", total)
            .add_attribute("status", status),
    )))
}

/// Ack payload `[contractAddr, refundAmounts[], refundAddrs[], status]`.
pub fn handle_transfer_out_ack(deps: DepsMut, payload: &[u8]) -> Result<Outcome, ContractError> {
    let decoded = open_list(payload, 4).and_then(|rlp| {
        Ok((
            decode_bytes(&rlp.at(0)?)?,
            decode_list(&rlp.at(1)?, decode_uint128)?,
            decode_list(&rlp.at(2)?, decode_bytes)?,
            decode_u64(&rlp.at(3)?)?,
        ))
    });
    let (contract, amounts, refund_addrs, status) = match decoded {
        Ok(fields) => fields,
        Err(err) => return Ok(Err(FailReason::from(err).into())),
    };
    refund(deps, &contract, &amounts, &refund_addrs, &status.to_string())
}

/// A fail-ack carries the original transfer-out payload; refund all of it.
pub fn handle_transfer_out_fail_ack(
    deps: DepsMut,
    payload: &[u8],
) -> Result<Outcome, ContractError> {
    let package = match TransferOutPackage::decode(payload) {
        Ok(package) => package,
        Err(err) => return Ok(Err(FailReason::from(err).into())),
    };
    refund(
        deps,
        &package.contract,
        &package.amounts,
        &package.refund_addrs,
        "fail_ack",
    )
}

// ============================================================================
// Transfer In
// ============================================================================

/// Refund response `[symbol, amount(bridge decimals), refundAddr, status]`.
fn refund_response(
    storage: &dyn Storage,
    package: &TransferInPackage,
    reason: FailReason,
) -> Result<Outcome, ContractError> {
    let decimals = match TOKEN_SYMBOLS.may_load(storage, &package.symbol)? {
        Some(token) => BOUND_TOKENS
            .may_load(storage, &token)?
            .map(|b| b.decimals)
            .unwrap_or(BRIDGE_DECIMALS),
        None => BRIDGE_DECIMALS,
    };

    // An empty symbol decodes fine but cannot be re-encoded; echo the padding
    let symbol = encode_symbol(&package.symbol).unwrap_or([0u8; 32]);

    let mut stream = RlpStream::new_list(4);
    append_bytes(&mut stream, &symbol);
    append_uint(&mut stream, floor_to_bridge_wide(package.amount, decimals));
    append_bytes(&mut stream, package.refund_addr.as_bytes());
    append_uint(&mut stream, refund_status(&reason));

    Ok(Err(Rejected::new(reason).with_response(stream.out().to_vec())))
}

pub fn handle_transfer_in(
    deps: DepsMut,
    ctx: &PackageContext,
    payload: &[u8],
) -> Result<Outcome, ContractError> {
    let package = match TransferInPackage::decode(payload) {
        Ok(package) => package,
        Err(err) => return Ok(Err(FailReason::from(err).into())),
    };
    let config = CONFIG.load(deps.storage)?;
    let now = ctx.env.block.time.seconds();

    if now > package.expire_time {
        return refund_response(deps.storage, &package, FailReason::Timeout);
    }

    let token = match token_from_bytes(deps.api, &config, &package.contract) {
        Ok(token) => token,
        Err(_) => return refund_response(deps.storage, &package, FailReason::UnboundToken),
    };
    match BOUND_TOKENS.may_load(deps.storage, &token)? {
        Some(bound) if bound.symbol == package.symbol => {}
        _ => return refund_response(deps.storage, &package, FailReason::UnboundToken),
    }

    let recipient = match local_from_bytes(deps.api, &package.recipient) {
        Ok(addr) => addr,
        Err(e) => return Ok(Err(FailReason::MalformedPayload(e.to_string()).into())),
    };

    if !take_locked(deps.storage, &token, package.amount)? {
        return refund_response(deps.storage, &package, FailReason::InsufficientBalance);
    }

    if is_large_transfer(deps.storage, &token, package.amount)? {
        let params = TOKEN_HUB_PARAMS.load(deps.storage)?;
        let lock = lock_transfer(
            deps.storage,
            &token,
            &recipient,
            package.amount,
            now + params.large_transfer_lock_period,
        )?;
        return Ok(Ok(Applied::new().add_event(
            Event::new("large_transfer_locked")
                .add_attribute("token", token)
                .add_attribute("recipient", recipient)
                .add_attribute("amount", package.amount)
                .add_attribute("locked_total", lock.amount)
                .add_attribute("unlock_at", lock.unlock_at.to_string()),
        )));
    }

    let payout = pay_token(
        deps.storage,
        &config,
        &token,
        &recipient,
        package.amount,
        "transfer_in",
    )?;
    Ok(Ok(Applied::new().add_message(payout).add_event(
        Event::new("transfer_in_success")
            .add_attribute("token", token)
            .add_attribute("recipient", recipient)
            .add_attribute("amount", package.amount),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_out_package_decodes_what_it_encodes() {
        let package = TransferOutPackage {
            symbol: "BNB".to_string(),
            contract: vec![],
            amounts: vec![Uint128::new(100_000_000), Uint128::new(1)],
            recipients: vec![RemoteAddress([0x11; 20]), RemoteAddress([0x22; 20])],
            refund_addrs: vec![vec![1, 2, 3], vec![4, 5, 6]],
            expire_time: 1_700_000_000,
        };
        let bytes = package.encode().unwrap();
        assert_eq!(TransferOutPackage::decode(&bytes).unwrap(), package);
        assert!(TransferOutPackage::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_transfer_in_rejects_short_refund_address() {
        let mut stream = RlpStream::new_list(6);
        append_bytes(&mut stream, &encode_symbol("BNB").unwrap());
        append_bytes(&mut stream, &[]);
        append_uint(&mut stream, 5u64);
        append_bytes(&mut stream, &[1, 2, 3]);
        append_bytes(&mut stream, &[0x11; 19]);
        append_uint(&mut stream, 10u64);
        assert!(TransferInPackage::decode(&stream.out()).is_err());
    }

    #[test]
    fn test_refund_status_codes() {
        assert_eq!(refund_status(&FailReason::Timeout), 1);
        assert_eq!(refund_status(&FailReason::UnboundToken), 2);
        assert_eq!(refund_status(&FailReason::InsufficientBalance), 3);
    }
}
