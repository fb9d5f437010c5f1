//! Common - Shared Wire Types for the Cross-Chain System Contracts
//!
//! This package provides the definitions that both the on-chain contract and
//! off-chain relayers need to agree on: channel ids, the package envelope and
//! the light-client query interface.

pub mod channel;
pub mod light_client;
pub mod package;

pub use channel::ChannelId;
pub use light_client::LightClientQueryMsg;
pub use package::{Package, PackageError, PackageType, PACKAGE_PREFIX_LEN};
