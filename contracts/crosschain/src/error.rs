//! Error types for the cross-chain contract
//!
//! `ContractError` aborts the triggering call. Business failures that happen
//! after a package has been authorized and sequenced are reported as a
//! `FailReason` instead (see `crate::app`).

use common::PackageError;
use cosmwasm_std::{ConversionOverflowError, OverflowError, StdError, Uint128};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("Invalid package: {0}")]
    InvalidPackage(#[from] PackageError),

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Unauthorized: the msg sender is not a relayer")]
    NotRelayer,

    #[error("Unauthorized: the msg sender is not a cabinet member")]
    NotCabinet,

    #[error("Unauthorized: only the system account can perform this action")]
    NotSystemAccount,

    #[error("Unauthorized: only a system reward operator can perform this action")]
    NotOperator,

    #[error("Unauthorized: only the token owner can perform this action")]
    NotTokenOwner,

    // ========================================================================
    // Relay Errors
    // ========================================================================
    #[error("Bridge is suspended")]
    Suspended,

    #[error("Channel not supported: {channel_id}")]
    UnknownChannel { channel_id: u8 },

    #[error("Light client has not synced height {height} yet")]
    UnverifiedHeight { height: u64 },

    #[error("Invalid merkle proof for package at height {height}")]
    UnverifiedProof { height: u64 },

    #[error("Sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u64, got: u64 },

    // ========================================================================
    // Circuit Breaker Errors
    // ========================================================================
    #[error("Bridge is already suspended")]
    AlreadySuspended,

    #[error("Bridge is not suspended")]
    NotSuspended,

    #[error("Already approved by this cabinet member")]
    AlreadyApproved,

    // ========================================================================
    // Arithmetic Errors
    // ========================================================================
    #[error("Overflow: {0}")]
    Overflow(String),

    #[error("Precision loss: {amount} is not a multiple of {unit}")]
    PrecisionLoss { amount: Uint128, unit: Uint128 },

    // ========================================================================
    // Amount & Funds Errors
    // ========================================================================
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Fee mismatch: expected {expected}, got {got}")]
    FeeMismatch { expected: Uint128, got: Uint128 },

    #[error("Deposit value must be greater than zero")]
    ZeroDeposit,

    #[error("Length mismatch: {reason}")]
    LengthMismatch { reason: String },

    #[error("Invalid address: {reason}")]
    InvalidAddress { reason: String },

    // ========================================================================
    // Relayer Errors
    // ========================================================================
    #[error("Relayer already exists")]
    AlreadyExists,

    #[error("Relayer does not exist")]
    DoesNotExist,

    #[error("Deposit value is not exactly the same: expected {expected}, got {got}")]
    ValueMismatch { expected: Uint128, got: Uint128 },

    #[error("No reward to claim")]
    NoReward,

    // ========================================================================
    // Token Bridge Errors
    // ========================================================================
    #[error("Token is not bound: {token}")]
    TokenNotBound { token: String },

    #[error("No bind request for symbol {symbol}")]
    BindRequestNotFound { symbol: String },

    #[error("Bind request for {symbol} is not expired")]
    BindNotExpired { symbol: String },

    #[error("Token {got} does not match the bind request token {expected}")]
    TokenMismatch { expected: String, got: String },

    #[error("Allowance must equal total supply minus the bridged amount: expected {expected}, got {got}")]
    AllowanceMismatch { expected: Uint128, got: Uint128 },

    #[error("Insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: Uint128, available: Uint128 },

    #[error("Expire time must be at least {min_seconds} seconds later")]
    InvalidExpireTime { min_seconds: u64 },

    #[error("Expired")]
    Expired,

    #[error("Still on locking period, unlocks at {unlock_at}")]
    StillLocked { unlock_at: u64 },

    #[error("No locked tokens for {recipient}")]
    NoLockedToken { recipient: String },

    // ========================================================================
    // Slash & Maintenance Errors
    // ========================================================================
    #[error("Validator {validator} was already slashed in this block")]
    AlreadySlashed { validator: String },

    #[error("Can not enter temporary maintenance")]
    CannotEnterMaintenance,

    #[error("Not in maintenance")]
    NotInMaintenance,

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Out of range: {reason}")]
    OutOfRange { reason: String },

    #[error("Validator set must not be empty")]
    EmptySet,

    #[error("Duplicate validator: {consensus_addr}")]
    DuplicateValidator { consensus_addr: String },

    #[error("Unknown reply id: {id}")]
    UnknownReply { id: u64 },

    #[error("Cannot migrate from {contract} {version}")]
    InvalidMigration { contract: String, version: String },
}

impl From<OverflowError> for ContractError {
    fn from(err: OverflowError) -> Self {
        ContractError::Overflow(err.to_string())
    }
}

impl From<ConversionOverflowError> for ContractError {
    fn from(err: ConversionOverflowError) -> Self {
        ContractError::Overflow(err.to_string())
    }
}
