//! Shared multi-test harness: a light-client stand-in, a CW20 token, and a
//! cross-chain contract with a registered relayer.

#![allow(dead_code)]

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    coins, to_json_binary, Addr, Api, Binary, Deps, DepsMut, Empty, Env, MessageInfo, Response,
    StdResult, Uint128, Uint256,
};
use cw20::{BalanceResponse, Cw20Coin, Cw20QueryMsg, MinterResponse};
use cw_multi_test::{App, AppResponse, Contract, ContractWrapper, Executor};
use cw_storage_plus::Item;
use rlp::RlpStream;

use common::{LightClientQueryMsg, Package};
use crosschain::codec::{append_bytes, append_uint, encode_symbol};
use crosschain::msg::{AmountResponse, ExecuteMsg, GenesisValidator, InstantiateMsg, QueryMsg};

pub const DENOM: &str = "abnb";
pub const E18: u128 = 1_000_000_000_000_000_000;
/// One bridge-decimal unit of the native denom
pub const UNIT: u128 = 10_000_000_000;
pub const RELAY_FEE: u128 = 2_000_000_000_000_000;
pub const RELAYER_DEPOSIT: u128 = 100 * E18;
pub const NATIVE_LIMIT: u128 = 10_000 * E18;
pub const LOCK_PERIOD: u64 = 21_600;
pub const HEIGHT: u64 = 10;

// ============================================================================
// Light Client Stand-In
// ============================================================================

#[cw_serde]
pub struct LightClientInit {}

#[cw_serde]
pub enum LightClientExecute {
    SetFinalized { height: u64 },
    SetProofsValid { valid: bool },
}

const FINALIZED: Item<u64> = Item::new("finalized");
const PROOFS_VALID: Item<bool> = Item::new("proofs_valid");

fn light_client_instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    _msg: LightClientInit,
) -> StdResult<Response> {
    FINALIZED.save(deps.storage, &100)?;
    PROOFS_VALID.save(deps.storage, &true)?;
    Ok(Response::new())
}

fn light_client_execute(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: LightClientExecute,
) -> StdResult<Response> {
    match msg {
        LightClientExecute::SetFinalized { height } => FINALIZED.save(deps.storage, &height)?,
        LightClientExecute::SetProofsValid { valid } => PROOFS_VALID.save(deps.storage, &valid)?,
    }
    Ok(Response::new())
}

fn light_client_query(deps: Deps, _env: Env, msg: LightClientQueryMsg) -> StdResult<Binary> {
    match msg {
        LightClientQueryMsg::IsHeightFinalized { height } => {
            to_json_binary(&(height <= FINALIZED.load(deps.storage)?))
        }
        LightClientQueryMsg::VerifyProof { .. } => to_json_binary(&PROOFS_VALID.load(deps.storage)?),
    }
}

// ============================================================================
// Contracts
// ============================================================================

fn contract_crosschain() -> Box<dyn Contract<Empty>> {
    let contract = ContractWrapper::new(
        crosschain::contract::execute,
        crosschain::contract::instantiate,
        crosschain::contract::query,
    )
    .with_reply(crosschain::contract::reply)
    .with_migrate(crosschain::contract::migrate);
    Box::new(contract)
}

fn contract_light_client() -> Box<dyn Contract<Empty>> {
    Box::new(ContractWrapper::new(
        light_client_execute,
        light_client_instantiate,
        light_client_query,
    ))
}

fn contract_cw20() -> Box<dyn Contract<Empty>> {
    Box::new(ContractWrapper::new(
        cw20_base::contract::execute,
        cw20_base::contract::instantiate,
        cw20_base::contract::query,
    ))
}

// ============================================================================
// Test Setup
// ============================================================================

pub struct TestEnv {
    pub app: App,
    pub contract: Addr,
    pub light_client: Addr,
    pub admin: Addr,
    pub system: Addr,
    pub relayer: Addr,
    pub user: Addr,
    /// Consensus addresses of the genesis validators, all in the cabinet
    pub validators: Vec<Addr>,
}

pub fn validator_addr(name: &str) -> Addr {
    Addr::unchecked(format!("terra1{}", name))
}

pub fn fee_addr(name: &str) -> Addr {
    Addr::unchecked(format!("terra1{}fee", name))
}

pub fn bsc_fee_addr(index: u8) -> [u8; 20] {
    [0x10 + index; 20]
}

fn genesis_validator(index: u8, name: &str) -> GenesisValidator {
    GenesisValidator {
        consensus_addr: validator_addr(name).to_string(),
        fee_addr: fee_addr(name).to_string(),
        bsc_fee_addr: format!("0x{}", hex::encode(bsc_fee_addr(index))),
        voting_power: 100,
    }
}

pub fn instantiate_msg(system: &Addr, light_client: &Addr, names: &[&str]) -> InstantiateMsg {
    InstantiateMsg {
        system_account: system.to_string(),
        light_client: light_client.to_string(),
        src_chain_id: 0x0038,
        dest_chain_id: 0x0060,
        native_denom: DENOM.to_string(),
        native_decimals: 18,
        native_symbol: "BNB".to_string(),
        native_large_transfer_limit: Some(Uint128::new(NATIVE_LIMIT)),
        address_table: None,
        channels: None,
        validators: names
            .iter()
            .enumerate()
            .map(|(i, name)| genesis_validator(i as u8, name))
            .collect(),
        system_reward_operators: vec![],
        params: None,
    }
}

/// Contract with validators `names`, a funded user and a registered relayer.
pub fn setup_with_validators(names: &[&str]) -> TestEnv {
    let mut app = App::default();

    let admin = Addr::unchecked("terra1admin");
    let system = Addr::unchecked("terra1system");
    let relayer = Addr::unchecked("terra1relayer");
    let user = Addr::unchecked("terra1user");

    app.init_modules(|router, _, storage| {
        for account in [&admin, &system, &relayer, &user] {
            router
                .bank
                .init_balance(storage, account, coins(1_000_000 * E18, DENOM))
                .unwrap();
        }
    });

    let light_client_code = app.store_code(contract_light_client());
    let light_client = app
        .instantiate_contract(
            light_client_code,
            admin.clone(),
            &LightClientInit {},
            &[],
            "light-client",
            None,
        )
        .unwrap();

    let code_id = app.store_code(contract_crosschain());
    let contract = app
        .instantiate_contract(
            code_id,
            admin.clone(),
            &instantiate_msg(&system, &light_client, names),
            &[],
            "crosschain",
            Some(admin.to_string()),
        )
        .unwrap();

    app.execute_contract(
        relayer.clone(),
        contract.clone(),
        &ExecuteMsg::RegisterRelayer {},
        &coins(RELAYER_DEPOSIT, DENOM),
    )
    .unwrap();

    TestEnv {
        app,
        contract,
        light_client,
        admin,
        system,
        relayer,
        user,
        validators: names.iter().map(|name| validator_addr(name)).collect(),
    }
}

pub fn setup() -> TestEnv {
    setup_with_validators(&["val1", "val2", "val3"])
}

/// CW20 token minted to `owner`, who is also its minter.
pub fn create_cw20(env: &mut TestEnv, owner: &Addr, symbol: &str, supply: u128) -> Addr {
    create_cw20_with_decimals(env, owner, symbol, supply, 18)
}

pub fn create_cw20_with_decimals(
    env: &mut TestEnv,
    owner: &Addr,
    symbol: &str,
    supply: u128,
    decimals: u8,
) -> Addr {
    let code_id = env.app.store_code(contract_cw20());
    env.app
        .instantiate_contract(
            code_id,
            owner.clone(),
            &cw20_base::msg::InstantiateMsg {
                name: format!("{} Token", symbol),
                symbol: symbol.to_string(),
                decimals,
                initial_balances: vec![Cw20Coin {
                    address: owner.to_string(),
                    amount: Uint128::new(supply),
                }],
                mint: Some(MinterResponse {
                    minter: owner.to_string(),
                    cap: None,
                }),
                marketing: None,
            },
            &[],
            symbol,
            None,
        )
        .unwrap()
}

// ============================================================================
// Packages
// ============================================================================

pub fn canonical(env: &TestEnv, addr: &Addr) -> Vec<u8> {
    env.app
        .api()
        .addr_canonicalize(addr.as_str())
        .unwrap()
        .as_slice()
        .to_vec()
}

fn handle_package_msg(channel_id: u8, package: &Package, sequence: u64) -> ExecuteMsg {
    ExecuteMsg::HandlePackage {
        channel_id,
        payload: Binary::from(package.encode()),
        proof: Binary::from(b"proof".to_vec()),
        height: HEIGHT,
        sequence,
    }
}

/// Deliver `package` as the registered relayer.
pub fn deliver(env: &mut TestEnv, channel_id: u8, package: Package, sequence: u64) -> AppResponse {
    let relayer = env.relayer.clone();
    env.app
        .execute_contract(
            relayer,
            env.contract.clone(),
            &handle_package_msg(channel_id, &package, sequence),
            &[],
        )
        .unwrap()
}

/// Deliver `package` as `sender` and return the root cause of the failure.
pub fn deliver_err(
    env: &mut TestEnv,
    sender: &Addr,
    channel_id: u8,
    package: Package,
    sequence: u64,
) -> String {
    env.app
        .execute_contract(
            sender.clone(),
            env.contract.clone(),
            &handle_package_msg(channel_id, &package, sequence),
            &[],
        )
        .unwrap_err()
        .root_cause()
        .to_string()
}

pub fn sync(payload: Vec<u8>) -> Package {
    Package::sync(Uint256::zero(), payload)
}

/// Governance payload `[key, value, target]`.
pub fn gov_payload(key: &str, value: &[u8], target: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(3);
    append_bytes(&mut stream, key.as_bytes());
    append_bytes(&mut stream, value);
    append_bytes(&mut stream, target);
    stream.out().to_vec()
}

pub fn uint_value(value: u128) -> Vec<u8> {
    Uint256::from(value).to_be_bytes().to_vec()
}

/// Well-known system address ending in `suffix`.
pub fn system_address(suffix: u16) -> Vec<u8> {
    let mut addr = vec![0u8; 20];
    addr[18..].copy_from_slice(&suffix.to_be_bytes());
    addr
}

/// Transfer-in payload `[symbol, contract, amount, recipient, refundAddr, expireTime]`.
pub fn transfer_in_payload(
    env: &TestEnv,
    symbol: &str,
    contract: &[u8],
    amount: u128,
    recipient: &Addr,
    expire_time: u64,
) -> Vec<u8> {
    let mut stream = RlpStream::new_list(6);
    append_bytes(&mut stream, &encode_symbol(symbol).unwrap());
    append_bytes(&mut stream, contract);
    append_uint(&mut stream, amount);
    append_bytes(&mut stream, &canonical(env, recipient));
    append_bytes(&mut stream, &[0xAB; 20]);
    append_uint(&mut stream, expire_time);
    stream.out().to_vec()
}

// ============================================================================
// Queries
// ============================================================================

pub fn native_balance(env: &TestEnv, addr: &Addr) -> u128 {
    env.app
        .wrap()
        .query_balance(addr, DENOM)
        .unwrap()
        .amount
        .u128()
}

pub fn amount_query(env: &TestEnv, msg: &QueryMsg) -> u128 {
    let res: AmountResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.contract, msg)
        .unwrap();
    res.amount.u128()
}

pub fn outgoing(env: &TestEnv, channel_id: u8, sequence: u64) -> Option<Package> {
    let res: Option<Binary> = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.contract,
            &QueryMsg::OutgoingPackage {
                channel_id,
                sequence,
            },
        )
        .unwrap();
    res.map(|bytes| Package::decode(bytes.as_slice()).unwrap())
}

pub fn cw20_balance(env: &TestEnv, token: &Addr, holder: &Addr) -> u128 {
    let res: BalanceResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            token,
            &Cw20QueryMsg::Balance {
                address: holder.to_string(),
            },
        )
        .unwrap();
    res.balance.u128()
}

pub fn event_attr(res: &AppResponse, ty: &str, key: &str) -> Option<String> {
    res.events
        .iter()
        .filter(|e| e.ty == ty || e.ty == format!("wasm-{}", ty))
        .flat_map(|e| &e.attributes)
        .find(|a| a.key == key)
        .map(|a| a.value.clone())
}

pub fn has_event(res: &AppResponse, ty: &str) -> bool {
    res.events
        .iter()
        .any(|e| e.ty == ty || e.ty == format!("wasm-{}", ty))
}
