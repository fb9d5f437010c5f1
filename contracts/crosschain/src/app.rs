//! Channel application interface.
//!
//! Every registered channel is served by a `CrossChainApp`. The router strips
//! the envelope and hands the payload to one of the three entry points.
//! A handler returns `Err(ContractError)` only for conditions that must abort
//! the whole call. Business failures are returned as `Ok(Err(Rejected))` and
//! are committed like a success, so the channel keeps moving.

use cosmwasm_std::{Addr, DepsMut, Env, Event, SubMsg};
use rlp::DecoderError;
use thiserror::Error;

use common::ChannelId;

use crate::error::ContractError;

/// Why a package was applied without effect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailReason {
    #[error("unknown package type")]
    UnknownType,

    #[error("unknown param")]
    UnknownParam,

    #[error("length of param value mismatch")]
    LengthMismatch,

    #[error("param value out of range")]
    OutOfRange,

    #[error("the target is not a system contract")]
    UnknownTarget,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("validator set must not be empty")]
    EmptySet,

    #[error("duplicate validator in set")]
    DuplicateValidator,

    #[error("the number of validators exceeds the limit")]
    TooManyValidators,

    #[error("length of jail validators must be one and the set must keep a validator")]
    InvalidJail,

    #[error("bind request already pending for symbol")]
    BindPending,

    #[error("symbol already bound")]
    AlreadyBound,

    #[error("package expired")]
    Timeout,

    #[error("token is not bound")]
    UnboundToken,

    #[error("insufficient locked balance")]
    InsufficientBalance,
}

impl FailReason {
    /// Stable numeric code sent back across the bridge.
    pub fn code(&self) -> u32 {
        match self {
            FailReason::UnknownType => 1,
            FailReason::UnknownParam => 2,
            FailReason::LengthMismatch => 3,
            FailReason::OutOfRange => 4,
            FailReason::UnknownTarget => 5,
            FailReason::MalformedPayload(_) => 100,
            FailReason::EmptySet => 101,
            FailReason::DuplicateValidator => 102,
            FailReason::TooManyValidators => 103,
            FailReason::InvalidJail => 104,
            FailReason::BindPending => 201,
            FailReason::AlreadyBound => 202,
            FailReason::Timeout => 301,
            FailReason::UnboundToken => 302,
            FailReason::InsufficientBalance => 303,
        }
    }
}

impl From<DecoderError> for FailReason {
    fn from(err: DecoderError) -> Self {
        FailReason::MalformedPayload(err.to_string())
    }
}

/// Result of a package that took effect.
#[derive(Debug, Default)]
pub struct Applied {
    /// Payload to send back on the same channel
    pub response: Option<Vec<u8>>,
    pub messages: Vec<SubMsg>,
    pub events: Vec<Event>,
}

impl Applied {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, payload: Vec<u8>) -> Self {
        self.response = Some(payload);
        self
    }

    pub fn add_message(mut self, msg: SubMsg) -> Self {
        self.messages.push(msg);
        self
    }

    pub fn add_messages(mut self, msgs: impl IntoIterator<Item = SubMsg>) -> Self {
        self.messages.extend(msgs);
        self
    }

    pub fn add_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn add_events(mut self, events: impl IntoIterator<Item = Event>) -> Self {
        self.events.extend(events);
        self
    }
}

/// Result of a package that was refused by its application.
#[derive(Debug)]
pub struct Rejected {
    pub reason: FailReason,
    /// Payload to send back on the same channel, e.g. a refund
    pub response: Option<Vec<u8>>,
}

impl Rejected {
    pub fn new(reason: FailReason) -> Self {
        Self {
            reason,
            response: None,
        }
    }

    pub fn with_response(mut self, payload: Vec<u8>) -> Self {
        self.response = Some(payload);
        self
    }
}

impl From<FailReason> for Rejected {
    fn from(reason: FailReason) -> Self {
        Rejected::new(reason)
    }
}

pub type Outcome = Result<Applied, Rejected>;

/// Per-package context handed to applications.
pub struct PackageContext<'a> {
    pub env: &'a Env,
    /// Relayer that submitted the package
    pub relayer: &'a Addr,
    pub channel_id: ChannelId,
    pub sequence: u64,
}

pub trait CrossChainApp {
    fn handle_syn_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError>;

    fn handle_ack_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError>;

    fn handle_fail_ack_package(
        &self,
        deps: DepsMut,
        ctx: &PackageContext,
        payload: &[u8],
    ) -> Result<Outcome, ContractError>;
}
