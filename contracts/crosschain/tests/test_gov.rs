//! Parameter governance over the governance channel.

mod support;

use cosmwasm_std::Uint128;

use common::channel::{GOV_CHANNEL_ID, TRANSFER_OUT_CHANNEL_ID};
use crosschain::msg::{
    BoundTokenResponse, ChannelResponse, OperatorsResponse, ParamsResponse, QueryMsg,
};
use crosschain::state::AppKind;

use support::*;

const SYSTEM_REWARD: u16 = 0x1002;
const TOKEN_HUB: u16 = 0x1004;
const RELAYER_INCENTIVE: u16 = 0x1005;
const RELAYER_HUB: u16 = 0x1006;
const GOV_HUB: u16 = 0x1007;
const CROSS_CHAIN: u16 = 0x2000;

fn params(env: &TestEnv) -> ParamsResponse {
    env.app
        .wrap()
        .query_wasm_smart(&env.contract, &QueryMsg::Params {})
        .unwrap()
}

/// Deliver `key = value` for `target` and return the failure code, if any.
fn propose(env: &mut TestEnv, sequence: u64, key: &str, value: &[u8], target: u16) -> Option<String> {
    let payload = gov_payload(key, value, &system_address(target));
    let res = deliver(env, GOV_CHANNEL_ID, sync(payload), sequence);
    event_attr(&res, "package_rejected", "code")
}

#[test]
fn test_token_hub_params() {
    let mut env = setup();

    assert_eq!(propose(&mut env, 0, "relayFee", &uint_value(3 * RELAY_FEE), TOKEN_HUB), None);
    assert_eq!(params(&env).token_hub.relay_fee, Uint128::new(3 * RELAY_FEE));

    // At most one week
    let code = propose(&mut env, 1, "largeTransferLockPeriod", &uint_value(604_801), TOKEN_HUB);
    assert_eq!(code, Some("4".to_string()));
    assert_eq!(params(&env).token_hub.large_transfer_lock_period, LOCK_PERIOD);

    assert_eq!(
        propose(&mut env, 2, "largeTransferLimit", &uint_value(E18), TOKEN_HUB),
        None
    );
    let native: Option<BoundTokenResponse> = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.contract,
            &QueryMsg::BoundToken {
                token: DENOM.to_string(),
            },
        )
        .unwrap();
    assert_eq!(native.unwrap().large_transfer_limit, Some(Uint128::new(E18)));
}

#[test]
fn test_relayer_params() {
    let mut env = setup();

    assert_eq!(propose(&mut env, 0, "dues", &uint_value(E18), RELAYER_HUB), None);
    assert_eq!(params(&env).relayer_hub.dues, Uint128::new(E18));

    // Round size may not drop below the weight cap
    let code = propose(&mut env, 1, "roundSize", &uint_value(50), RELAYER_INCENTIVE);
    assert_eq!(code, Some("4".to_string()));

    assert_eq!(propose(&mut env, 2, "maximumWeight", &uint_value(20), RELAYER_INCENTIVE), None);
    assert_eq!(propose(&mut env, 3, "roundSize", &uint_value(50), RELAYER_INCENTIVE), None);
    let incentive = params(&env).relayer_incentive;
    assert_eq!(incentive.round_size, 50);
    assert_eq!(incentive.maximum_weight, 20);

    let code = propose(&mut env, 4, "maximumWeight", &uint_value(51), RELAYER_INCENTIVE);
    assert_eq!(code, Some("4".to_string()));
}

#[test]
fn test_failures_are_reported_with_codes() {
    let mut env = setup();
    let before = params(&env);

    assert_eq!(
        propose(&mut env, 0, "relayFee", &uint_value(1), 0x4242),
        Some("5".to_string())
    );
    assert_eq!(
        propose(&mut env, 1, "relayFee", &[0u8; 31], TOKEN_HUB),
        Some("3".to_string())
    );
    assert_eq!(
        propose(&mut env, 2, "noSuchParam", &uint_value(1), TOKEN_HUB),
        Some("2".to_string())
    );
    assert_eq!(
        propose(&mut env, 3, "relayFee", &uint_value(1), GOV_HUB),
        Some("2".to_string())
    );
    assert_eq!(params(&env), before);

    // Each failure answers on the governance channel with `[code]`
    let reply = outgoing(&env, GOV_CHANNEL_ID, 0).unwrap();
    assert_eq!(reply.payload, vec![0xc1, 0x05]);
    let reply = outgoing(&env, GOV_CHANNEL_ID, 1).unwrap();
    assert_eq!(reply.payload, vec![0xc1, 0x03]);
}

#[test]
fn test_successful_update_sends_no_response() {
    let mut env = setup();
    propose(&mut env, 0, "dues", &uint_value(E18), RELAYER_HUB);
    assert!(outgoing(&env, GOV_CHANNEL_ID, 0).is_none());
}

#[test]
fn test_add_or_update_channel() {
    let mut env = setup();

    let mut value = vec![20u8, 1];
    value.extend(system_address(TOKEN_HUB));
    assert_eq!(propose(&mut env, 0, "addOrUpdateChannel", &value, CROSS_CHAIN), None);

    let channel: ChannelResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.contract, &QueryMsg::Channel { channel_id: 20 })
        .unwrap();
    assert_eq!(channel.app, AppKind::TokenHub);
    assert!(channel.from_system_reward);
    assert_eq!(channel.send_sequence, 0);
    assert_eq!(channel.receive_sequence, 0);

    // Only the channel applications can be routed to
    let mut value = vec![21u8, 0];
    value.extend(system_address(RELAYER_HUB));
    assert_eq!(
        propose(&mut env, 1, "addOrUpdateChannel", &value, CROSS_CHAIN),
        Some("4".to_string())
    );

    assert_eq!(
        propose(&mut env, 2, "addOrUpdateChannel", &[20u8, 1], CROSS_CHAIN),
        Some("3".to_string())
    );

    // The outbound transfer channel stays with the token hub
    let mut value = vec![TRANSFER_OUT_CHANNEL_ID, 1];
    value.extend(system_address(GOV_HUB));
    assert_eq!(
        propose(&mut env, 3, "addOrUpdateChannel", &value, CROSS_CHAIN),
        Some("4".to_string())
    );
    let channel: ChannelResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.contract,
            &QueryMsg::Channel {
                channel_id: TRANSFER_OUT_CHANNEL_ID,
            },
        )
        .unwrap();
    assert_eq!(channel.app, AppKind::TokenHub);
}

#[test]
fn test_system_reward_operators() {
    let mut env = setup();
    let user = env.user.clone();
    let operators = |env: &TestEnv| -> OperatorsResponse {
        env.app
            .wrap()
            .query_wasm_smart(&env.contract, &QueryMsg::Operators {})
            .unwrap()
    };

    let value = canonical(&env, &user);
    assert_eq!(propose(&mut env, 0, "addOperator", &value, SYSTEM_REWARD), None);
    assert!(operators(&env).operators.contains(&user));

    assert_eq!(propose(&mut env, 1, "deleteOperator", &value, SYSTEM_REWARD), None);
    assert!(!operators(&env).operators.contains(&user));
}
