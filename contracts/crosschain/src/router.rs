//! Cross-chain router.
//!
//! Entry point for every package delivered by a relayer. The package is
//! checked against the breaker, the relayer set, the channel table, the light
//! client and the channel's receive sequence, then handed to its application.

use cosmwasm_std::{Binary, DepsMut, Env, Event, MessageInfo, Response, Uint128};

use common::channel::channel_name;
use common::{ChannelId, Package, PackageType};

use crate::app::{Outcome, PackageContext};
use crate::apps::app_for;
use crate::breaker;
use crate::codec::from_bridge_amount;
use crate::error::ContractError;
use crate::hash::{bytes32_to_hex, compute_payload_hash};
use crate::light_client::{ensure_height_finalized, ensure_proof_valid};
use crate::registry;
use crate::relayer_hub::is_relayer;
use crate::relayer_incentive;
use crate::state::CONFIG;

#[allow(clippy::too_many_arguments)]
pub fn execute_handle_package(
    mut deps: DepsMut,
    env: Env,
    info: MessageInfo,
    channel_id: ChannelId,
    payload: Binary,
    proof: Binary,
    height: u64,
    sequence: u64,
) -> Result<Response, ContractError> {
    breaker::ensure_active(deps.storage)?;
    if !is_relayer(deps.storage, &info.sender)? {
        return Err(ContractError::NotRelayer);
    }

    let config = CONFIG.load(deps.storage)?;
    let mut channel = registry::load_channel(deps.storage, channel_id)?;

    ensure_height_finalized(&deps.querier, &config.light_client, height)?;
    registry::check_receive_sequence(&channel, sequence)?;

    let payload_hash = compute_payload_hash(
        config.src_chain_id,
        config.dest_chain_id,
        channel_id,
        sequence,
        payload.as_slice(),
    );
    ensure_proof_valid(&deps.querier, &config.light_client, height, proof, payload_hash)?;

    let package = Package::decode(payload.as_slice())?;
    registry::accept_receive_sequence(deps.storage, channel_id, &mut channel)?;

    let ctx = PackageContext {
        env: &env,
        relayer: &info.sender,
        channel_id,
        sequence,
    };
    let app = app_for(channel.app);
    let outcome: Outcome = match package.package_type {
        PackageType::Sync => app.handle_syn_package(deps.branch(), &ctx, &package.payload)?,
        PackageType::Ack => app.handle_ack_package(deps.branch(), &ctx, &package.payload)?,
        PackageType::FailAck => {
            app.handle_fail_ack_package(deps.branch(), &ctx, &package.payload)?
        }
    };

    let mut response = Response::new()
        .add_attribute("method", "handle_package")
        .add_attribute("channel_id", channel_id.to_string())
        .add_attribute("sequence", sequence.to_string())
        .add_attribute("payload_hash", bytes32_to_hex(&payload_hash));

    let (reply_payload, status_event) = match outcome {
        Ok(applied) => {
            response = response
                .add_submessages(applied.messages)
                .add_events(applied.events);
            (applied.response, Event::new("package_accepted"))
        }
        Err(rejected) => (
            rejected.response,
            Event::new("package_rejected")
                .add_attribute("reason", rejected.reason.to_string())
                .add_attribute("code", rejected.reason.code().to_string()),
        ),
    };
    response = response.add_event(
        status_event
            .add_attribute("channel_id", channel_id.to_string())
            .add_attribute("channel", channel_name(channel_id))
            .add_attribute("sequence", sequence.to_string())
            .add_attribute("package_type", package.package_type.as_str()),
    );

    if let Some(reply_payload) = reply_payload {
        let event = registry::send_syn_package(
            deps.storage,
            channel_id,
            reply_payload,
            channel.relay_fee,
        )?;
        response = response.add_event(event);
    }

    let from_system = channel.from_system_reward || package.package_type != PackageType::Sync;
    // Envelope fees are in bridge decimals; the payout is capped by the source pool.
    let relay_fee = Uint128::try_from(package.relay_fee)
        .ok()
        .and_then(|fee| from_bridge_amount(fee, config.native_decimals).ok())
        .unwrap_or(Uint128::MAX);
    let reward_events = relayer_incentive::add_reward(
        deps.storage,
        &info.sender,
        relay_fee,
        from_system,
    )?;

    Ok(response.add_events(reward_events))
}
