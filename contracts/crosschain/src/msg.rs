//! Message types for the cross-chain contract
//!
//! Instantiation bootstraps the whole system: configuration, channel table,
//! genesis validator set and component parameters. After that, parameters
//! change only through governance packages.

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary, Uint128};

use crate::apps::token_hub::bind::BindRequest;
use crate::apps::token_hub::lock::LockInfo;
use crate::apps::token_hub::TokenHubParams;
use crate::apps::validator_set::maintenance::Maintenance;
use crate::apps::validator_set::slash::{Indicator, SlashParams};
use crate::apps::validator_set::{Validator, ValidatorSetParams};
use crate::relayer_hub::{Relayer, RelayerHubParams};
use crate::relayer_incentive::{IncentiveParams, RoundSummary};
use crate::state::{AddressTable, AppKind, Config};

// ============================================================================
// Instantiate & Migrate
// ============================================================================

/// Migrate message
#[cw_serde]
pub struct MigrateMsg {}

/// A validator of the genesis set
#[cw_serde]
pub struct GenesisValidator {
    pub consensus_addr: String,
    pub fee_addr: String,
    /// Fee address on the other chain, 20-byte hex
    pub bsc_fee_addr: String,
    pub voting_power: u64,
}

/// A channel registered at instantiate
#[cw_serde]
pub struct ChannelInit {
    pub channel_id: u8,
    pub app: AppKind,
    pub relay_fee: Uint128,
    pub from_system_reward: bool,
}

/// Genesis parameters; any component left out uses its defaults
#[cw_serde]
#[derive(Default)]
pub struct GenesisParams {
    pub validator_set: Option<ValidatorSetParams>,
    pub slash: Option<SlashParams>,
    pub relayer_incentive: Option<IncentiveParams>,
    pub token_hub: Option<TokenHubParams>,
    pub relayer_hub: Option<RelayerHubParams>,
}

/// Instantiate message
#[cw_serde]
pub struct InstantiateMsg {
    /// Account allowed to call `Deposit`
    pub system_account: String,
    /// Light-client contract
    pub light_client: String,
    pub src_chain_id: u16,
    pub dest_chain_id: u16,
    pub native_denom: String,
    pub native_decimals: u8,
    /// Symbol the native denom is bound to on the other chain
    pub native_symbol: String,
    /// Large-transfer limit of the native denom
    pub native_large_transfer_limit: Option<Uint128>,
    /// Component addresses; defaults to the well-known system addresses
    pub address_table: Option<AddressTable>,
    /// Channel table; defaults to bind, transfer, validator-set, governance and slash
    pub channels: Option<Vec<ChannelInit>>,
    pub validators: Vec<GenesisValidator>,
    pub system_reward_operators: Vec<String>,
    pub params: Option<GenesisParams>,
}

// ============================================================================
// Execute Messages
// ============================================================================

/// Execute messages
#[cw_serde]
pub enum ExecuteMsg {
    // ========================================================================
    // Relay
    // ========================================================================
    /// Deliver a package from the other chain. Relayers only.
    HandlePackage {
        channel_id: u8,
        /// Wire-format package: type, relay fee, payload
        payload: Binary,
        /// Merkle proof checked by the light client
        proof: Binary,
        height: u64,
        sequence: u64,
    },

    // ========================================================================
    // Cabinet
    // ========================================================================
    /// Halt every channel
    Suspend {},
    /// Approve reopening the bridge
    Reopen {},
    /// Approve cancelling a large-transfer lock
    CancelTransfer { token: String, recipient: String },

    // ========================================================================
    // Validator Set
    // ========================================================================
    /// Credit the attached block reward to a validator. System account only.
    Deposit { validator: String },
    /// Report a validator that missed its turn. System account only.
    Slash { validator: String },
    /// Step the sending validator out of block production
    EnterMaintenance {},
    /// Return from maintenance and take the earned penalty
    ExitMaintenance {},

    // ========================================================================
    // Relayers
    // ========================================================================
    /// Register the sender, attaching exactly the required deposit
    RegisterRelayer {},
    /// Unregister the sender and refund deposit minus dues
    UnregisterRelayer {},
    /// Pay out a relayer's accumulated rewards
    ClaimRelayerReward { relayer: String },

    // ========================================================================
    // System Reward
    // ========================================================================
    /// Add the attached funds to the system reward pool
    FundSystemReward {},
    /// Pay from the system reward pool. Operators only.
    ClaimSystemReward { to: String, amount: Uint128 },

    // ========================================================================
    // Token Hub
    // ========================================================================
    /// Send a bound token to the other chain
    TransferOut {
        /// Native denom or CW20 address
        token: String,
        /// 20-byte hex address on the other chain
        recipient: String,
        amount: Uint128,
        expire_time: u64,
    },
    /// Send native value to several recipients in one package
    BatchTransferOut {
        recipients: Vec<String>,
        amounts: Vec<Uint128>,
        refund_addrs: Vec<String>,
        expire_time: u64,
    },
    /// Approve a pending bind, as the token's minter
    ApproveBind { symbol: String, token: String },
    /// Reject a pending bind, as the token's minter
    RejectBind { symbol: String, token: String },
    /// Expire a pending bind after its expiry
    ExpireBind { symbol: String },
    /// Pay out a large-transfer lock after its unlock time
    WithdrawUnlockedToken { token: String, recipient: String },
    /// Set a CW20 token's large-transfer limit, as its minter
    SetLargeTransferLimit { token: String, limit: Uint128 },
}

// ============================================================================
// Query Messages
// ============================================================================

/// Query messages
#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Config)]
    Config {},

    #[returns(ChannelResponse)]
    Channel { channel_id: u8 },

    #[returns(ChannelsResponse)]
    Channels {},

    /// Outgoing package in wire format
    #[returns(Option<Binary>)]
    OutgoingPackage { channel_id: u8, sequence: u64 },

    #[returns(BreakerStatusResponse)]
    BreakerStatus {},

    #[returns(CabinetResponse)]
    Cabinet {},

    #[returns(ValidatorsResponse)]
    Validators {},

    #[returns(Option<Validator>)]
    Validator { consensus_addr: String },

    #[returns(AmountResponse)]
    DeprecatedIncoming {},

    #[returns(Indicator)]
    SlashIndicator { validator: String },

    #[returns(MaintainingResponse)]
    Maintaining {},

    #[returns(RelayerRoundResponse)]
    RelayerRound {},

    #[returns(Option<RoundSummary>)]
    RoundSummary { round: u64 },

    #[returns(AmountResponse)]
    RelayerReward { relayer: String },

    #[returns(Option<Relayer>)]
    Relayer { relayer: String },

    #[returns(AmountResponse)]
    SystemRewardPool {},

    #[returns(OperatorsResponse)]
    Operators {},

    #[returns(Option<BindRequest>)]
    BindRequest { symbol: String },

    #[returns(Option<BoundTokenResponse>)]
    BoundToken { token: String },

    #[returns(AmountResponse)]
    LockedBalance { token: String },

    #[returns(Option<LockInfo>)]
    LockInfo { token: String, recipient: String },

    #[returns(AmountResponse)]
    CollectedFees {},

    #[returns(ParamsResponse)]
    Params {},
}

// ============================================================================
// Query Responses
// ============================================================================

#[cw_serde]
pub struct ChannelResponse {
    pub channel_id: u8,
    pub name: String,
    pub app: AppKind,
    pub relay_fee: Uint128,
    pub from_system_reward: bool,
    pub send_sequence: u64,
    pub receive_sequence: u64,
}

#[cw_serde]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelResponse>,
}

#[cw_serde]
pub struct BreakerStatusResponse {
    pub suspended: bool,
    pub reopen_round: u64,
    pub suspended_at: Option<u64>,
    /// Approvals collected for the current reopening round
    pub reopen_approvals: u32,
}

#[cw_serde]
pub struct CabinetResponse {
    pub members: Vec<Addr>,
}

#[cw_serde]
pub struct ValidatorsResponse {
    pub validators: Vec<Validator>,
}

#[cw_serde]
pub struct MaintainingResponse {
    pub validators: Vec<Maintenance>,
}

#[cw_serde]
pub struct AmountResponse {
    pub amount: Uint128,
}

#[cw_serde]
pub struct RelayerWeight {
    pub relayer: Addr,
    pub weight: u64,
}

#[cw_serde]
pub struct RelayerRoundResponse {
    pub sequence: u64,
    pub count: u64,
    pub total: Uint128,
    pub weights: Vec<RelayerWeight>,
}

#[cw_serde]
pub struct OperatorsResponse {
    pub operators: Vec<Addr>,
}

#[cw_serde]
pub struct BoundTokenResponse {
    pub token: String,
    pub symbol: String,
    pub decimals: u8,
    pub large_transfer_limit: Option<Uint128>,
}

#[cw_serde]
pub struct ParamsResponse {
    pub validator_set: ValidatorSetParams,
    pub slash: SlashParams,
    pub relayer_incentive: IncentiveParams,
    pub token_hub: TokenHubParams,
    pub relayer_hub: RelayerHubParams,
}
