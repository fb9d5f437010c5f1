//! Channel id table.
//!
//! Every logical sub-protocol of the bridge is sequenced independently under a
//! small integer id. Both chains must use the same table.

/// Channel identifier as carried on the wire.
pub type ChannelId = u8;

/// Token bind / unbind requests and their status replies.
pub const BIND_CHANNEL_ID: ChannelId = 0x01;
/// Inbound token transfers.
pub const TRANSFER_IN_CHANNEL_ID: ChannelId = 0x02;
/// Outbound token transfers (acks and fail-acks come back on this channel).
pub const TRANSFER_OUT_CHANNEL_ID: ChannelId = 0x03;
/// Validator-set updates and jail commands.
pub const VALIDATOR_SET_CHANNEL_ID: ChannelId = 0x08;
/// Parameter governance.
pub const GOV_CHANNEL_ID: ChannelId = 0x09;
/// Relayer incentive bookkeeping.
pub const RELAYER_INCENTIVE_CHANNEL_ID: ChannelId = 0x0a;
/// Slash indications.
pub const SLASH_CHANNEL_ID: ChannelId = 0x0b;
/// Cross-chain staking.
pub const CROSS_STAKE_CHANNEL_ID: ChannelId = 0x10;

/// Human readable channel name, used in events.
pub fn channel_name(id: ChannelId) -> &'static str {
    match id {
        BIND_CHANNEL_ID => "bind",
        TRANSFER_IN_CHANNEL_ID => "transfer_in",
        TRANSFER_OUT_CHANNEL_ID => "transfer_out",
        VALIDATOR_SET_CHANNEL_ID => "validator_set",
        GOV_CHANNEL_ID => "gov",
        RELAYER_INCENTIVE_CHANNEL_ID => "relayer_incentive",
        SLASH_CHANNEL_ID => "slash",
        CROSS_STAKE_CHANNEL_ID => "cross_stake",
        _ => "unknown",
    }
}
