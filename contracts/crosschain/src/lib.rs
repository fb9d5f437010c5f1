//! Cross-chain system contract
//!
//! Relays packages between this chain and a partner chain over numbered
//! channels, and hosts the applications that consume them.
//!
//! # Inbound Flow
//! 1. A registered relayer calls `HandlePackage` with a payload, a merkle proof
//!    and the height it was committed at
//! 2. The light client confirms the height and the proof
//! 3. The channel's receive sequence must match exactly
//! 4. The channel application applies the package; business failures are
//!    committed and reported, never reverted
//! 5. Any response is queued on the same channel and the relayer earns a share
//!    of the relay fee
//!
//! # Applications
//! - Validator set: rotation, jailing and block-reward distribution
//! - Token hub: binding, transfer-in, transfer-out, large-transfer locks
//! - Governance: parameter updates for every component
//!
//! # Security
//! - Cabinet circuit breaker (one vote suspends, two reopen)
//! - Large-transfer locks with cabinet cancellation
//! - Payouts that cannot be delivered are redirected to the system reward pool

pub mod address_codec;
pub mod app;
pub mod apps;
pub mod breaker;
pub mod codec;
pub mod contract;
pub mod error;
pub mod hash;
pub mod light_client;
pub mod msg;
pub mod payout;
mod query;
pub mod registry;
pub mod relayer_hub;
pub mod relayer_incentive;
pub mod router;
pub mod state;
pub mod system_reward;

pub use crate::app::{CrossChainApp, FailReason, Outcome};
pub use crate::error::ContractError;
pub use crate::hash::{compute_payload_hash, keccak256};
