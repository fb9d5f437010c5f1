//! State definitions for the cross-chain contract
//!
//! Contract-wide configuration and the channel table live here. Each component
//! keeps its own domain records next to its logic (validator records in
//! `apps::validator_set`, lock records in `apps::token_hub`, and so on).

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Uint128};
use cw_storage_plus::{Item, Map};

use common::channel::{
    BIND_CHANNEL_ID, GOV_CHANNEL_ID, SLASH_CHANNEL_ID, TRANSFER_IN_CHANNEL_ID,
    TRANSFER_OUT_CHANNEL_ID, VALIDATOR_SET_CHANNEL_ID,
};
use common::ChannelId;

// ============================================================================
// Contract Info
// ============================================================================

/// Contract name for cw2 migration info
pub const CONTRACT_NAME: &str = "crates.io:crosschain";
/// Contract version for cw2 migration info
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decimals every amount is expressed in on the other chain.
pub const BRIDGE_DECIMALS: u8 = 8;

// ============================================================================
// Core Configuration
// ============================================================================

/// Contract configuration, fixed at instantiate.
#[cw_serde]
pub struct Config {
    /// Account allowed to deposit block rewards (the block producer module)
    pub system_account: Addr,
    /// Light-client contract consulted for heights and proofs
    pub light_client: Addr,
    /// Chain id of the source chain in package keys
    pub src_chain_id: u16,
    /// Chain id of this chain in package keys
    pub dest_chain_id: u16,
    /// Native denom used for deposits, fees and native transfers
    pub native_denom: String,
    /// Decimals of the native denom
    pub native_decimals: u8,
    /// Symbol the native token is bound to on the other chain
    pub native_symbol: String,
    /// Well-known component addresses, as seen by governance packages
    pub address_table: AddressTable,
}

/// Well-known 20-byte addresses of the system components.
///
/// Governance packages name their target by one of these addresses.
#[cw_serde]
pub struct AddressTable {
    pub validator_set: String,
    #[serde(default = "default_slash_indicator")]
    pub slash_indicator: String,
    pub system_reward: String,
    pub token_hub: String,
    pub relayer_incentive: String,
    pub relayer_hub: String,
    pub gov_hub: String,
    pub cross_chain: String,
}

impl Default for AddressTable {
    fn default() -> Self {
        Self {
            validator_set: "0x0000000000000000000000000000000000001000".to_string(),
            slash_indicator: default_slash_indicator(),
            system_reward: "0x0000000000000000000000000000000000001002".to_string(),
            token_hub: "0x0000000000000000000000000000000000001004".to_string(),
            relayer_incentive: "0x0000000000000000000000000000000000001005".to_string(),
            relayer_hub: "0x0000000000000000000000000000000000001006".to_string(),
            gov_hub: "0x0000000000000000000000000000000000001007".to_string(),
            cross_chain: "0x0000000000000000000000000000000000002000".to_string(),
        }
    }
}

fn default_slash_indicator() -> String {
    "0x0000000000000000000000000000000000001001".to_string()
}

/// A system component that can be targeted by governance.
#[cw_serde]
#[derive(Copy, Eq)]
pub enum Component {
    ValidatorSet,
    SlashIndicator,
    SystemReward,
    TokenHub,
    RelayerIncentive,
    RelayerHub,
    GovHub,
    CrossChain,
}

impl AddressTable {
    pub fn entries(&self) -> [(Component, &str); 8] {
        [
            (Component::ValidatorSet, self.validator_set.as_str()),
            (Component::SlashIndicator, self.slash_indicator.as_str()),
            (Component::SystemReward, self.system_reward.as_str()),
            (Component::TokenHub, self.token_hub.as_str()),
            (Component::RelayerIncentive, self.relayer_incentive.as_str()),
            (Component::RelayerHub, self.relayer_hub.as_str()),
            (Component::GovHub, self.gov_hub.as_str()),
            (Component::CrossChain, self.cross_chain.as_str()),
        ]
    }
}

pub const CONFIG: Item<Config> = Item::new("config");

// ============================================================================
// Channel Table
// ============================================================================

/// Application that handles the packages of a channel.
#[cw_serde]
#[derive(Copy, Eq)]
pub enum AppKind {
    ValidatorSet,
    TokenHub,
    GovHub,
    Slash,
}

/// A registered channel.
#[cw_serde]
pub struct ChannelConfig {
    /// Channel handler
    pub app: AppKind,
    /// Relay fee attached to response packages sent on this channel
    pub relay_fee: Uint128,
    /// Whether relayers are rewarded from the system reward pool for this channel
    pub from_system_reward: bool,
    /// Next sequence for outgoing packages
    pub send_sequence: u64,
    /// Next expected sequence for incoming packages
    pub receive_sequence: u64,
}

impl ChannelConfig {
    pub fn new(app: AppKind, relay_fee: Uint128, from_system_reward: bool) -> Self {
        Self {
            app,
            relay_fee,
            from_system_reward,
            send_sequence: 0,
            receive_sequence: 0,
        }
    }
}

/// Channel table keyed by channel id
pub const CHANNELS: Map<ChannelId, ChannelConfig> = Map::new("channels");

/// Outgoing packages keyed by (channel, sequence), stored in wire format
pub const SEND_QUEUE: Map<(ChannelId, u64), Binary> = Map::new("send_queue");

/// Channels registered when the instantiate message does not list any.
pub fn default_channels() -> Vec<(ChannelId, ChannelConfig)> {
    vec![
        (
            BIND_CHANNEL_ID,
            ChannelConfig::new(AppKind::TokenHub, Uint128::zero(), false),
        ),
        (
            TRANSFER_IN_CHANNEL_ID,
            ChannelConfig::new(AppKind::TokenHub, Uint128::zero(), false),
        ),
        (
            TRANSFER_OUT_CHANNEL_ID,
            ChannelConfig::new(AppKind::TokenHub, Uint128::zero(), false),
        ),
        (
            VALIDATOR_SET_CHANNEL_ID,
            ChannelConfig::new(AppKind::ValidatorSet, Uint128::zero(), true),
        ),
        (
            GOV_CHANNEL_ID,
            ChannelConfig::new(AppKind::GovHub, Uint128::zero(), true),
        ),
        (
            SLASH_CHANNEL_ID,
            ChannelConfig::new(AppKind::Slash, Uint128::zero(), true),
        ),
    ]
}
