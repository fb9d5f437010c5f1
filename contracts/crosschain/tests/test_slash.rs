//! Slash indicator and temporary maintenance.

mod support;

use cosmwasm_std::coins;
use cw_multi_test::{next_block, AppResponse, Executor};
use rlp::{Rlp, RlpStream};

use common::channel::{GOV_CHANNEL_ID, SLASH_CHANNEL_ID, VALIDATOR_SET_CHANNEL_ID};
use common::Package;
use crosschain::apps::validator_set::slash::Indicator;
use crosschain::codec::{append_bytes, append_uint, decode_u64};
use crosschain::msg::{ExecuteMsg, MaintainingResponse, QueryMsg, ValidatorsResponse};

use support::*;

const SLASH_INDICATOR: u16 = 0x1001;

fn deposit(env: &mut TestEnv, name: &str, amount: u128) {
    let system = env.system.clone();
    env.app
        .execute_contract(
            system,
            env.contract.clone(),
            &ExecuteMsg::Deposit {
                validator: validator_addr(name).to_string(),
            },
            &coins(amount, DENOM),
        )
        .unwrap();
}

/// Report `name` once, in a fresh block.
fn slash(env: &mut TestEnv, name: &str) -> AppResponse {
    env.app.update_block(next_block);
    let system = env.system.clone();
    env.app
        .execute_contract(
            system,
            env.contract.clone(),
            &ExecuteMsg::Slash {
                validator: validator_addr(name).to_string(),
            },
            &[],
        )
        .unwrap()
}

fn slash_times(env: &mut TestEnv, name: &str, times: u64) -> AppResponse {
    let mut last = None;
    for _ in 0..times {
        last = Some(slash(env, name));
    }
    last.unwrap()
}

fn set_thresholds(env: &mut TestEnv, misdemeanor: u128, felony: u128) {
    let target = system_address(SLASH_INDICATOR);
    // Misdemeanor first, felony must stay above it
    let payload = gov_payload("misdemeanorThreshold", &uint_value(misdemeanor), &target);
    let res = deliver(env, GOV_CHANNEL_ID, sync(payload), 0);
    assert!(has_event(&res, "package_accepted"));
    let payload = gov_payload("felonyThreshold", &uint_value(felony), &target);
    let res = deliver(env, GOV_CHANNEL_ID, sync(payload), 1);
    assert!(has_event(&res, "package_accepted"));
}

fn indicator(env: &TestEnv, name: &str) -> Indicator {
    env.app
        .wrap()
        .query_wasm_smart(
            &env.contract,
            &QueryMsg::SlashIndicator {
                validator: validator_addr(name).to_string(),
            },
        )
        .unwrap()
}

fn incoming(env: &TestEnv) -> Vec<(String, u128)> {
    let res: ValidatorsResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.contract, &QueryMsg::Validators {})
        .unwrap();
    res.validators
        .into_iter()
        .map(|v| (v.consensus_addr.to_string(), v.incoming.u128()))
        .collect()
}

fn maintaining(env: &TestEnv) -> Vec<String> {
    let res: MaintainingResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.contract, &QueryMsg::Maintaining {})
        .unwrap();
    res.validators
        .into_iter()
        .map(|m| m.validator.to_string())
        .collect()
}

fn validator_call(env: &mut TestEnv, name: &str, msg: ExecuteMsg) -> Result<AppResponse, String> {
    env.app
        .execute_contract(validator_addr(name), env.contract.clone(), &msg, &[])
        .map_err(|e| e.root_cause().to_string())
}

fn rotate(env: &mut TestEnv, names: &[&str], sequence: u64) -> AppResponse {
    let mut stream = RlpStream::new_list(2);
    append_uint(&mut stream, 0u64);
    stream.begin_list(names.len());
    for (i, name) in names.iter().enumerate() {
        stream.begin_list(4);
        append_bytes(&mut stream, &canonical(env, &validator_addr(name)));
        append_bytes(&mut stream, &canonical(env, &fee_addr(name)));
        append_bytes(&mut stream, &bsc_fee_addr(i as u8));
        append_uint(&mut stream, 100u64);
    }
    deliver(env, VALIDATOR_SET_CHANNEL_ID, sync(stream.out().to_vec()), sequence)
}

// ============================================================================
// Slash Indicator
// ============================================================================

#[test]
fn test_slash_counts_once_per_block_from_system_account() {
    let mut env = setup();

    let user = env.user.clone();
    let err = env
        .app
        .execute_contract(
            user,
            env.contract.clone(),
            &ExecuteMsg::Slash {
                validator: validator_addr("val1").to_string(),
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("only the system account"));

    for i in 1..=3 {
        let res = slash(&mut env, "val1");
        assert_eq!(
            event_attr(&res, "validator_slashed", "count"),
            Some(i.to_string())
        );
    }
    assert_eq!(indicator(&env, "val1").count, 3);
    assert_eq!(indicator(&env, "val1").height, env.app.block_info().height);

    let system = env.system.clone();
    let err = env
        .app
        .execute_contract(
            system,
            env.contract.clone(),
            &ExecuteMsg::Slash {
                validator: validator_addr("val1").to_string(),
            },
            &[],
        )
        .unwrap_err();
    assert!(err.root_cause().to_string().contains("already slashed in this block"));

    // Addresses outside the set are counted too
    slash(&mut env, "stranger");
    assert_eq!(indicator(&env, "stranger").count, 1);
}

#[test]
fn test_misdemeanor_shares_incoming_with_the_rest() {
    let mut env = setup();
    set_thresholds(&mut env, 2, 4);
    deposit(&mut env, "val1", 2 * E18 + 1);
    deposit(&mut env, "val2", E18);

    slash(&mut env, "val1");
    assert_eq!(incoming(&env)[0].1, 2 * E18 + 1);

    let res = slash(&mut env, "val1");
    assert_eq!(
        event_attr(&res, "validator_misdemeanor", "amount"),
        Some((2 * E18 + 1).to_string())
    );
    let set = incoming(&env);
    assert_eq!(set[0].1, 0);
    assert_eq!(set[1].1, 2 * E18);
    assert_eq!(set[2].1, E18);
    // The indivisible remainder waits for the next rotation's sweep
    assert_eq!(amount_query(&env, &QueryMsg::DeprecatedIncoming {}), 1);

    // A misdemeanor also steps the validator out
    assert_eq!(maintaining(&env), vec![validator_addr("val1").to_string()]);
}

#[test]
fn test_felony_removes_validator_and_reports_it() {
    let mut env = setup();
    set_thresholds(&mut env, 2, 4);
    slash_times(&mut env, "val2", 2);
    deposit(&mut env, "val2", 4 * E18);

    let res = slash_times(&mut env, "val2", 2);
    assert_eq!(
        event_attr(&res, "validator_felony", "amount"),
        Some((4 * E18).to_string())
    );

    let set = incoming(&env);
    assert_eq!(set.len(), 2);
    assert!(!set.iter().any(|(addr, _)| addr == validator_addr("val2").as_str()));
    assert!(set.iter().all(|(_, amount)| *amount == 2 * E18));
    assert!(maintaining(&env).is_empty());

    // Felony `[validator, height, srcChainId, timestamp]` goes to the other chain
    let package = outgoing(&env, SLASH_CHANNEL_ID, 0).unwrap();
    let rlp = Rlp::new(&package.payload);
    assert_eq!(
        rlp.at(0).unwrap().data().unwrap(),
        canonical(&env, &validator_addr("val2")).as_slice()
    );
    assert_eq!(
        decode_u64(&rlp.at(1).unwrap()).unwrap(),
        env.app.block_info().height
    );
    assert_eq!(decode_u64(&rlp.at(2).unwrap()).unwrap(), 0x0038);

    // Its acknowledgement comes back on the same channel
    let res = deliver(&mut env, SLASH_CHANNEL_ID, Package::ack(package.payload), 0);
    assert!(has_event(&res, "felony_acknowledged"));
}

#[test]
fn test_felony_keeps_the_last_validator() {
    let mut env = setup_with_validators(&["solo"]);
    set_thresholds(&mut env, 1, 2);
    deposit(&mut env, "solo", E18);

    slash_times(&mut env, "solo", 2);

    assert_eq!(incoming(&env), vec![(validator_addr("solo").to_string(), E18)]);
    assert!(outgoing(&env, SLASH_CHANNEL_ID, 0).is_none());
}

#[test]
fn test_rotation_decays_indicators() {
    let mut env = setup();
    // Every rotation forgives 8 / 4 = 2 reports
    set_thresholds(&mut env, 5, 8);
    slash_times(&mut env, "val1", 3);
    slash(&mut env, "val2");

    rotate(&mut env, &["val1", "val2", "val3"], 0);

    assert_eq!(indicator(&env, "val1").count, 1);
    assert_eq!(indicator(&env, "val2"), Indicator::default());
}

// ============================================================================
// Maintenance
// ============================================================================

#[test]
fn test_enter_and_exit_maintenance() {
    let mut env = setup();

    let err = validator_call(&mut env, "val1", ExecuteMsg::ExitMaintenance {}).unwrap_err();
    assert!(err.contains("Not in maintenance"));

    let res = validator_call(&mut env, "val1", ExecuteMsg::EnterMaintenance {}).unwrap();
    assert!(has_event(&res, "maintenance_entered"));
    assert_eq!(maintaining(&env), vec![validator_addr("val1").to_string()]);

    let err = validator_call(&mut env, "val1", ExecuteMsg::EnterMaintenance {}).unwrap_err();
    assert!(err.contains("Can not enter temporary maintenance"));
    let err = validator_call(&mut env, "stranger", ExecuteMsg::EnterMaintenance {}).unwrap_err();
    assert!(err.contains("Can not enter temporary maintenance"));

    // A short stay costs nothing
    env.app.update_block(|b| b.height += 10);
    let res = validator_call(&mut env, "val1", ExecuteMsg::ExitMaintenance {}).unwrap();
    assert_eq!(event_attr(&res, "maintenance_exited", "slashes"), Some("1".to_string()));
    assert!(!has_event(&res, "validator_misdemeanor"));
    assert!(maintaining(&env).is_empty());

    // Once per validator set
    let err = validator_call(&mut env, "val1", ExecuteMsg::EnterMaintenance {}).unwrap_err();
    assert!(err.contains("Can not enter temporary maintenance"));
}

#[test]
fn test_long_maintenance_is_judged_on_exit() {
    let mut env = setup();
    deposit(&mut env, "val1", 2 * E18);
    deposit(&mut env, "val3", 2 * E18);

    validator_call(&mut env, "val1", ExecuteMsg::EnterMaintenance {}).unwrap();
    validator_call(&mut env, "val3", ExecuteMsg::EnterMaintenance {}).unwrap();

    // Two working validators, scale 2: 50 slashes after 200 blocks
    env.app.update_block(|b| b.height += 200);
    let res = validator_call(&mut env, "val1", ExecuteMsg::ExitMaintenance {}).unwrap();
    assert_eq!(event_attr(&res, "maintenance_exited", "slashes"), Some("50".to_string()));
    assert!(has_event(&res, "validator_misdemeanor"));
    let set = incoming(&env);
    assert_eq!(set[0].1, 0);
    assert_eq!(set[1].1, E18);
    assert_eq!(set[2].1, 3 * E18);
    // Judged on exit, not re-entered
    assert_eq!(maintaining(&env), vec![validator_addr("val3").to_string()]);

    // Three working validators: 150 slashes after 900 blocks is a felony
    env.app.update_block(|b| b.height += 700);
    let res = validator_call(&mut env, "val3", ExecuteMsg::ExitMaintenance {}).unwrap();
    assert_eq!(event_attr(&res, "maintenance_exited", "slashes"), Some("150".to_string()));
    assert!(has_event(&res, "validator_felony"));
    assert_eq!(incoming(&env).len(), 2);
}

#[test]
fn test_rotation_ends_maintenance() {
    let mut env = setup();
    validator_call(&mut env, "val2", ExecuteMsg::EnterMaintenance {}).unwrap();

    let res = rotate(&mut env, &["val1", "val2", "val3"], 0);
    assert!(has_event(&res, "maintenance_exited"));
    assert!(maintaining(&env).is_empty());

    // A new set opens a new chance
    validator_call(&mut env, "val2", ExecuteMsg::EnterMaintenance {}).unwrap();
    assert_eq!(maintaining(&env), vec![validator_addr("val2").to_string()]);
}
