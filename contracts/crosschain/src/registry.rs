//! Channel registry.
//!
//! Owns the per-channel sequence counters and the queue of outgoing packages
//! relayers pick up and deliver to the other chain.

use cosmwasm_std::{Binary, Event, StdResult, Storage, Uint128, Uint256};

use common::channel::channel_name;
use common::{ChannelId, Package};

use crate::error::ContractError;
use crate::state::{AppKind, ChannelConfig, CHANNELS, SEND_QUEUE};

pub fn load_channel(storage: &dyn Storage, channel_id: ChannelId) -> Result<ChannelConfig, ContractError> {
    CHANNELS
        .may_load(storage, channel_id)?
        .ok_or(ContractError::UnknownChannel { channel_id })
}

/// Fail unless `sequence` is the next expected receive sequence.
pub fn check_receive_sequence(channel: &ChannelConfig, sequence: u64) -> Result<(), ContractError> {
    if sequence != channel.receive_sequence {
        return Err(ContractError::SequenceMismatch {
            expected: channel.receive_sequence,
            got: sequence,
        });
    }
    Ok(())
}

/// Advance the receive sequence of an accepted package.
pub fn accept_receive_sequence(
    storage: &mut dyn Storage,
    channel_id: ChannelId,
    channel: &mut ChannelConfig,
) -> StdResult<()> {
    channel.receive_sequence += 1;
    CHANNELS.save(storage, channel_id, channel)
}

/// Queue a Sync package on `channel_id` and return the emitted event.
pub fn send_syn_package(
    storage: &mut dyn Storage,
    channel_id: ChannelId,
    payload: Vec<u8>,
    relay_fee: Uint128,
) -> Result<Event, ContractError> {
    send_package(storage, channel_id, Package::sync(Uint256::from(relay_fee), payload))
}

pub fn send_package(
    storage: &mut dyn Storage,
    channel_id: ChannelId,
    package: Package,
) -> Result<Event, ContractError> {
    let mut channel = load_channel(storage, channel_id)?;
    let sequence = channel.send_sequence;

    SEND_QUEUE.save(storage, (channel_id, sequence), &Binary::from(package.encode()))?;
    channel.send_sequence += 1;
    CHANNELS.save(storage, channel_id, &channel)?;

    Ok(Event::new("cross_chain_package")
        .add_attribute("channel_id", channel_id.to_string())
        .add_attribute("channel", channel_name(channel_id))
        .add_attribute("sequence", sequence.to_string())
        .add_attribute("package_type", package.package_type.as_str())
        .add_attribute("relay_fee", package.relay_fee.to_string())
        .add_attribute("payload", hex::encode(&package.payload)))
}

/// Register a channel, or re-point an existing one while keeping its sequences.
pub fn add_or_update_channel(
    storage: &mut dyn Storage,
    channel_id: ChannelId,
    app: AppKind,
    from_system_reward: bool,
) -> StdResult<()> {
    let channel = match CHANNELS.may_load(storage, channel_id)? {
        Some(mut existing) => {
            existing.app = app;
            existing.from_system_reward = from_system_reward;
            existing
        }
        None => ChannelConfig::new(app, Uint128::zero(), from_system_reward),
    };
    CHANNELS.save(storage, channel_id, &channel)
}
