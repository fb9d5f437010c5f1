//! Validator set and block-reward distribution.
//!
//! The block producer deposits fees for a validator through `Deposit`. They
//! accumulate as the validator's `incoming` until the set rotates or the
//! validator is jailed, at which point every outstanding balance is settled:
//! dust and abnormal amounts are swept to the system reward pool, large
//! amounts cross the bridge in one batch, everything else is paid directly.
//!
//! - `slash` - slash indicator, misdemeanor and felony
//! - `maintenance` - temporary maintenance of validators

pub mod maintenance;
pub mod slash;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    Addr, Api, BankMsg, Coin, DepsMut, Env, Event, MessageInfo, Response, StdResult, Storage,
    SubMsg, Uint128,
};
use cw_storage_plus::Item;
use rlp::{Rlp, RlpStream};

use crate::address_codec::{encode_remote_address, local_from_bytes, RemoteAddress};
use crate::app::{Applied, CrossChainApp, FailReason, Outcome, PackageContext, Rejected};
use crate::apps::gov_hub::{decode_u64_param, decode_uint_param};
use crate::apps::token_hub;
use crate::codec::{append_uint, decode_bytes, decode_list, decode_u64, open_list, precision_unit};
use crate::error::ContractError;
use crate::payout::{paid_amount, pay_native};
use crate::state::{Config, CONFIG};
use crate::system_reward;

/// Denominator of `burn_ratio`
pub const BURN_RATIO_SCALE: u64 = 10_000;

const UPDATE_VALIDATOR_SET: u64 = 0;
const JAIL_VALIDATOR: u64 = 1;

// ============================================================================
// Parameters
// ============================================================================

#[cw_serde]
pub struct ValidatorSetParams {
    /// Share of every deposit that is burned, in basis points
    pub burn_ratio: u64,
    /// The first `num_of_cabinets` validators form the cabinet
    pub num_of_cabinets: u32,
    pub max_num_of_validators: u32,
    /// Expiry of the cross-chain distribution batch, in seconds
    pub expire_time_second_gap: u64,
    /// Incoming below this is swept to the system reward pool
    pub dust_threshold: Uint128,
    /// Incoming at or above this crosses the bridge
    pub batch_threshold: Uint128,
    /// Incoming above this is considered abnormal and swept; zero disables the check
    pub max_incoming: Uint128,
    /// Paid to the relayer that delivers a rotation, out of the sweep
    pub rotation_caller_fee: Uint128,
    /// Validators allowed in maintenance at once; zero disables maintenance
    pub max_num_of_maintaining: u32,
    /// Divides the blocks spent in maintenance into slashes
    pub maintain_slash_scale: u64,
}

impl Default for ValidatorSetParams {
    fn default() -> Self {
        Self {
            burn_ratio: 0,
            num_of_cabinets: 21,
            max_num_of_validators: 41,
            expire_time_second_gap: 1000,
            dust_threshold: Uint128::new(10_000_000_000),
            batch_threshold: Uint128::new(100_000_000_000_000_000),
            max_incoming: Uint128::zero(),
            rotation_caller_fee: Uint128::zero(),
            max_num_of_maintaining: 3,
            maintain_slash_scale: 2,
        }
    }
}

impl ValidatorSetParams {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.burn_ratio > BURN_RATIO_SCALE {
            return Err(ContractError::OutOfRange {
                reason: "burn_ratio is at most 10000".to_string(),
            });
        }
        if self.num_of_cabinets == 0 || self.num_of_cabinets > self.max_num_of_validators {
            return Err(ContractError::OutOfRange {
                reason: "need 0 < num_of_cabinets <= max_num_of_validators".to_string(),
            });
        }
        if self.dust_threshold > self.batch_threshold {
            return Err(ContractError::OutOfRange {
                reason: "dust_threshold must not exceed batch_threshold".to_string(),
            });
        }
        if self.max_num_of_maintaining >= self.num_of_cabinets {
            return Err(ContractError::OutOfRange {
                reason: "max_num_of_maintaining must be below num_of_cabinets".to_string(),
            });
        }
        if !(1..10).contains(&self.maintain_slash_scale) {
            return Err(ContractError::OutOfRange {
                reason: "maintain_slash_scale must be between 1 and 9".to_string(),
            });
        }
        Ok(())
    }

    /// Apply a governance update.
    pub fn update(&mut self, key: &str, value: &[u8]) -> Result<(), FailReason> {
        match key {
            "burnRatio" => {
                let v = decode_u64_param(value)?;
                if v > BURN_RATIO_SCALE {
                    return Err(FailReason::OutOfRange);
                }
                self.burn_ratio = v;
            }
            "numOfCabinets" => {
                let v = u32::try_from(decode_u64_param(value)?).map_err(|_| FailReason::OutOfRange)?;
                if v == 0 || v > self.max_num_of_validators || v <= self.max_num_of_maintaining {
                    return Err(FailReason::OutOfRange);
                }
                self.num_of_cabinets = v;
            }
            "maxNumOfValidators" => {
                let v = u32::try_from(decode_u64_param(value)?).map_err(|_| FailReason::OutOfRange)?;
                if v < self.num_of_cabinets {
                    return Err(FailReason::OutOfRange);
                }
                self.max_num_of_validators = v;
            }
            "expireTimeSecondGap" => {
                let v = decode_u64_param(value)?;
                if !(100..=100_000).contains(&v) {
                    return Err(FailReason::OutOfRange);
                }
                self.expire_time_second_gap = v;
            }
            "dustThreshold" => {
                let v = decode_uint_param(value)?;
                if v > self.batch_threshold {
                    return Err(FailReason::OutOfRange);
                }
                self.dust_threshold = v;
            }
            "batchThreshold" => {
                let v = decode_uint_param(value)?;
                if v < self.dust_threshold {
                    return Err(FailReason::OutOfRange);
                }
                self.batch_threshold = v;
            }
            "maxIncoming" => self.max_incoming = decode_uint_param(value)?,
            "rotationCallerFee" => self.rotation_caller_fee = decode_uint_param(value)?,
            "maxNumOfMaintaining" => {
                let v = u32::try_from(decode_u64_param(value)?).map_err(|_| FailReason::OutOfRange)?;
                if v >= self.num_of_cabinets {
                    return Err(FailReason::OutOfRange);
                }
                self.max_num_of_maintaining = v;
            }
            "maintainSlashScale" => {
                let v = decode_u64_param(value)?;
                if !(1..10).contains(&v) {
                    return Err(FailReason::OutOfRange);
                }
                self.maintain_slash_scale = v;
            }
            _ => return Err(FailReason::UnknownParam),
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

#[cw_serde]
pub struct Validator {
    pub consensus_addr: Addr,
    /// Local account receiving direct payouts
    pub fee_addr: Addr,
    /// Remote account receiving batched payouts, 0x-prefixed hex
    pub bsc_fee_addr: String,
    pub voting_power: u64,
    /// Deposits since the last settlement
    pub incoming: Uint128,
}

pub const VALIDATOR_SET_PARAMS: Item<ValidatorSetParams> = Item::new("validator_set_params");
/// Current set, in cabinet order
pub const VALIDATORS: Item<Vec<Validator>> = Item::new("validators");
/// Deposits made for accounts outside the set, swept at the next rotation
pub const DEPRECATED_INCOMING: Item<Uint128> = Item::new("deprecated_incoming");

pub fn load_validators(storage: &dyn Storage) -> StdResult<Vec<Validator>> {
    Ok(VALIDATORS.may_load(storage)?.unwrap_or_default())
}

pub fn deprecated_incoming(storage: &dyn Storage) -> StdResult<Uint128> {
    Ok(DEPRECATED_INCOMING.may_load(storage)?.unwrap_or_default())
}

/// The first `num_of_cabinets` validators.
pub fn cabinet(storage: &dyn Storage) -> StdResult<Vec<Addr>> {
    let params = VALIDATOR_SET_PARAMS.load(storage)?;
    Ok(load_validators(storage)?
        .into_iter()
        .take(params.num_of_cabinets as usize)
        .map(|v| v.consensus_addr)
        .collect())
}

pub fn is_cabinet_member(storage: &dyn Storage, addr: &Addr) -> StdResult<bool> {
    Ok(cabinet(storage)?.iter().any(|member| member == addr))
}

/// Check a candidate set before it is installed.
pub fn check_new_set(params: &ValidatorSetParams, set: &[Validator]) -> Result<(), FailReason> {
    if set.is_empty() {
        return Err(FailReason::EmptySet);
    }
    if set.len() > params.max_num_of_validators as usize {
        return Err(FailReason::TooManyValidators);
    }
    for (i, validator) in set.iter().enumerate() {
        if set[..i]
            .iter()
            .any(|other| other.consensus_addr == validator.consensus_addr)
        {
            return Err(FailReason::DuplicateValidator);
        }
    }
    Ok(())
}

/// Share the incoming of `validators[index]` evenly among the others.
///
/// The division remainder joins the deprecated incoming and is swept at the
/// next rotation. Returns the amount taken; a lone validator keeps its own.
pub fn redistribute_incoming(
    storage: &mut dyn Storage,
    validators: &mut [Validator],
    index: usize,
) -> Result<Uint128, ContractError> {
    let rest = validators.len() as u128 - 1;
    if rest == 0 {
        return Ok(Uint128::zero());
    }
    let income = std::mem::take(&mut validators[index].incoming);
    let share = income / Uint128::new(rest);
    if !share.is_zero() {
        for (i, validator) in validators.iter_mut().enumerate() {
            if i != index {
                validator.incoming = validator.incoming.checked_add(share)?;
            }
        }
    }
    let remainder = income - share * Uint128::new(rest);
    if !remainder.is_zero() {
        let deprecated = deprecated_incoming(storage)?.checked_add(remainder)?;
        DEPRECATED_INCOMING.save(storage, &deprecated)?;
    }
    Ok(income)
}

// ============================================================================
// Deposit
// ============================================================================

/// Credit the attached block reward to `validator`. System account only.
pub fn execute_deposit(
    deps: DepsMut,
    info: MessageInfo,
    validator: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.system_account {
        return Err(ContractError::NotSystemAccount);
    }
    let amount = paid_amount(&info, &config.native_denom)?;
    if amount.is_zero() {
        return Err(ContractError::ZeroDeposit);
    }

    let validator = deps.api.addr_validate(&validator)?;
    let params = VALIDATOR_SET_PARAMS.load(deps.storage)?;
    let burned = amount.multiply_ratio(params.burn_ratio, BURN_RATIO_SCALE);
    let value = amount - burned;

    let mut validators = load_validators(deps.storage)?;
    let event = match validators
        .iter_mut()
        .find(|v| v.consensus_addr == validator)
    {
        Some(record) => {
            record.incoming = record.incoming.checked_add(value)?;
            VALIDATORS.save(deps.storage, &validators)?;
            Event::new("validator_deposit")
        }
        None => {
            let deprecated = deprecated_incoming(deps.storage)?.checked_add(value)?;
            DEPRECATED_INCOMING.save(deps.storage, &deprecated)?;
            Event::new("deprecated_deposit")
        }
    };

    let mut response = Response::new()
        .add_attribute("method", "deposit")
        .add_event(
            event
                .add_attribute("validator", validator)
                .add_attribute("amount", value)
                .add_attribute("burned", burned),
        );
    if !burned.is_zero() {
        response = response.add_message(BankMsg::Burn {
            amount: vec![Coin {
                denom: config.native_denom,
                amount: burned,
            }],
        });
    }

    Ok(response)
}

// ============================================================================
// Settlement
// ============================================================================

/// Where each settled balance goes.
#[derive(Debug, Default, PartialEq)]
pub struct Settlement {
    /// (fee address, amount) paid on this chain
    pub direct: Vec<(Addr, Uint128)>,
    /// (remote fee address, local refund address, amount) sent across
    pub batch: Vec<(String, Addr, Uint128)>,
    pub sweep: Uint128,
}

impl Settlement {
    pub fn direct_total(&self) -> Uint128 {
        self.direct.iter().map(|(_, a)| *a).sum()
    }

    pub fn batch_total(&self) -> Uint128 {
        self.batch.iter().map(|(_, _, a)| *a).sum()
    }

    /// Route one validator's incoming.
    pub fn add(
        &mut self,
        params: &ValidatorSetParams,
        unit: Uint128,
        validator: &Validator,
    ) -> Result<(), ContractError> {
        let incoming = validator.incoming;
        if incoming.is_zero() {
            return Ok(());
        }

        let abnormal = !params.max_incoming.is_zero() && incoming > params.max_incoming;
        if incoming < params.dust_threshold || abnormal {
            self.sweep = self.sweep.checked_add(incoming)?;
        } else if incoming >= params.batch_threshold {
            let remainder = incoming % unit;
            let crossing = incoming - remainder;
            self.sweep = self.sweep.checked_add(remainder)?;
            if !crossing.is_zero() {
                self.batch.push((
                    validator.bsc_fee_addr.clone(),
                    validator.fee_addr.clone(),
                    crossing,
                ));
            }
        } else {
            self.direct.push((validator.fee_addr.clone(), incoming));
        }
        Ok(())
    }
}

/// Plan the settlement of `validators` plus the deprecated balance.
pub fn plan_settlement(
    params: &ValidatorSetParams,
    unit: Uint128,
    validators: &[Validator],
    deprecated: Uint128,
) -> Result<Settlement, ContractError> {
    let mut settlement = Settlement {
        sweep: deprecated,
        ..Settlement::default()
    };
    for validator in validators {
        settlement.add(params, unit, validator)?;
    }
    Ok(settlement)
}

/// Turn a settlement into payouts, the batch package and pool credits.
fn execute_settlement(
    storage: &mut dyn Storage,
    api: &dyn Api,
    env: &Env,
    config: &Config,
    params: &ValidatorSetParams,
    settlement: Settlement,
    caller: &Addr,
) -> Result<(Vec<SubMsg>, Vec<Event>), ContractError> {
    let mut messages = vec![];
    let mut events = vec![];

    let caller_fee = params.rotation_caller_fee.min(settlement.sweep);
    let to_pool = settlement.sweep - caller_fee;
    let direct_total = settlement.direct_total();
    let batch_total = settlement.batch_total();

    for (fee_addr, amount) in &settlement.direct {
        messages.push(pay_native(
            storage,
            &config.native_denom,
            fee_addr,
            *amount,
            "validator_reward",
        )?);
    }

    if !settlement.batch.is_empty() {
        let mut recipients = Vec::with_capacity(settlement.batch.len());
        let mut refund_addrs = Vec::with_capacity(settlement.batch.len());
        let mut amounts = Vec::with_capacity(settlement.batch.len());
        for (remote, refund, amount) in settlement.batch {
            recipients.push(RemoteAddress::from_hex(&remote)?);
            refund_addrs.push(refund);
            amounts.push(amount);
        }
        let expire_time = env.block.time.seconds() + params.expire_time_second_gap;
        events.push(token_hub::emit_batch_native(
            storage,
            api,
            config,
            &recipients,
            &amounts,
            &refund_addrs,
            expire_time,
        )?);
    }

    system_reward::credit(storage, to_pool)?;
    if !caller_fee.is_zero() {
        messages.push(pay_native(
            storage,
            &config.native_denom,
            caller,
            caller_fee,
            "rotation_caller_fee",
        )?);
    }

    events.push(
        Event::new("rotation_completed")
            .add_attribute("direct", direct_total)
            .add_attribute("batch", batch_total)
            .add_attribute("system_reward", to_pool)
            .add_attribute("caller_fee", caller_fee),
    );

    Ok((messages, events))
}

// ============================================================================
// Packages
// ============================================================================

fn decode_validator(api: &dyn Api, rlp: &Rlp) -> Result<Validator, FailReason> {
    if !rlp.is_list() || rlp.item_count()? != 4 {
        return Err(FailReason::MalformedPayload(
            "validator must be a list of 4 items".to_string(),
        ));
    }
    let consensus_addr = local_from_bytes(api, &decode_bytes(&rlp.at(0)?)?)
        .map_err(|e| FailReason::MalformedPayload(e.to_string()))?;
    let fee_addr = local_from_bytes(api, &decode_bytes(&rlp.at(1)?)?)
        .map_err(|e| FailReason::MalformedPayload(e.to_string()))?;
    let bsc_fee_addr = RemoteAddress::from_slice(&decode_bytes(&rlp.at(2)?)?)
        .map_err(|e| FailReason::MalformedPayload(e.to_string()))?;
    let voting_power = decode_u64(&rlp.at(3)?)?;

    Ok(Validator {
        consensus_addr,
        fee_addr,
        bsc_fee_addr: encode_remote_address(&bsc_fee_addr.0),
        voting_power,
        incoming: Uint128::zero(),
    })
}

fn decode_package(api: &dyn Api, payload: &[u8]) -> Result<(u64, Vec<Validator>), FailReason> {
    let rlp = open_list(payload, 2)?;
    let package_type = decode_u64(&rlp.at(0)?)?;
    let raw = decode_list(&rlp.at(1)?, |item| Ok(item.as_raw().to_vec()))?;
    let validators = raw
        .iter()
        .map(|bytes| decode_validator(api, &Rlp::new(bytes)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((package_type, validators))
}

fn reject(reason: FailReason) -> Outcome {
    let mut stream = RlpStream::new_list(1);
    append_uint(&mut stream, reason.code() as u64);
    let response = stream.out().to_vec();
    Err(Rejected::new(reason).with_response(response))
}

fn update_validator_set(
    deps: DepsMut,
    ctx: &PackageContext,
    new_set: Vec<Validator>,
) -> Result<Outcome, ContractError> {
    let params = VALIDATOR_SET_PARAMS.load(deps.storage)?;
    if let Err(reason) = check_new_set(&params, &new_set) {
        return Ok(reject(reason));
    }

    let config = CONFIG.load(deps.storage)?;
    let unit = precision_unit(config.native_decimals)?;
    // Maintenance penalties land on the outgoing set before it is settled
    let mut maintenance_events =
        maintenance::exit_all(deps.storage, deps.api, ctx.env, &config)?;
    let outgoing = load_validators(deps.storage)?;
    let deprecated = deprecated_incoming(deps.storage)?;

    let settlement = plan_settlement(&params, unit, &outgoing, deprecated)?;
    DEPRECATED_INCOMING.save(deps.storage, &Uint128::zero())?;
    let (messages, events) = execute_settlement(
        deps.storage,
        deps.api,
        ctx.env,
        &config,
        &params,
        settlement,
        ctx.relayer,
    )?;

    slash::decay_indicators(deps.storage)?;

    let size = new_set.len();
    VALIDATORS.save(deps.storage, &new_set)?;
    maintenance_events.extend(events);

    Ok(Ok(Applied::new()
        .add_messages(messages)
        .add_events(maintenance_events)
        .add_event(Event::new("validator_set_updated").add_attribute("size", size.to_string()))))
}

fn jail_validator(
    deps: DepsMut,
    ctx: &PackageContext,
    named: Vec<Validator>,
) -> Result<Outcome, ContractError> {
    if named.len() != 1 {
        return Ok(reject(FailReason::InvalidJail));
    }
    let target = &named[0].consensus_addr;

    let mut validators = load_validators(deps.storage)?;
    let index = match validators.iter().position(|v| &v.consensus_addr == target) {
        Some(index) => index,
        None => return Ok(Ok(Applied::new())),
    };
    if validators.len() == 1 {
        return Ok(reject(FailReason::InvalidJail));
    }

    let jailed = validators.remove(index);
    maintenance::remove(deps.storage, &jailed.consensus_addr)?;
    let params = VALIDATOR_SET_PARAMS.load(deps.storage)?;
    let config = CONFIG.load(deps.storage)?;
    let unit = precision_unit(config.native_decimals)?;

    let settlement = plan_settlement(&params, unit, std::slice::from_ref(&jailed), Uint128::zero())?;
    let (messages, events) = execute_settlement(
        deps.storage,
        deps.api,
        ctx.env,
        &config,
        &params,
        settlement,
        ctx.relayer,
    )?;
    VALIDATORS.save(deps.storage, &validators)?;

    Ok(Ok(Applied::new()
        .add_messages(messages)
        .add_events(events)
        .add_event(
            Event::new("validator_jailed").add_attribute("validator", jailed.consensus_addr),
        )))
}

pub struct ValidatorSetApp;

impl CrossChainApp for ValidatorSetApp {
    fn handle_syn_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        let (package_type, validators) = match decode_package(deps.api, payload) {
            Ok(decoded) => decoded,
            Err(reason) => return Ok(reject(reason)),
        };
        match package_type {
            UPDATE_VALIDATOR_SET => update_validator_set(deps, ctx, validators),
            JAIL_VALIDATOR => jail_validator(deps, ctx, validators),
            _ => Ok(reject(FailReason::UnknownType)),
        }
    }

    fn handle_ack_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        _payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Err(FailReason::UnknownType.into()))
    }

    fn handle_fail_ack_package(
        &self,
        _deps: DepsMut,
        _ctx: &PackageContext,
        _payload: &[u8],
    ) -> Result<Outcome, ContractError> {
        Ok(Err(FailReason::UnknownType.into()))
    }
}
