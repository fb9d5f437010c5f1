//! Native payouts that never block the enclosing operation.
//!
//! Each payout is dispatched as a `reply_always` sub-message. If the bank send
//! fails (for example the recipient is a module account that refuses funds),
//! the amount is credited to the system reward pool instead.

use cosmwasm_std::{
    Addr, BankMsg, Coin, DepsMut, Event, MessageInfo, Reply, Response, StdResult, Storage,
    SubMsg, SubMsgResult, Uint128,
};
use cw_storage_plus::{Item, Map};
use cosmwasm_schema::cw_serde;

use crate::error::ContractError;
use crate::system_reward;

/// Reply ids at or above this value belong to payouts.
pub const PAYOUT_REPLY_ID_OFFSET: u64 = 1_000_000;

#[cw_serde]
pub struct PendingPayout {
    pub recipient: Addr,
    pub amount: Uint128,
    /// What the payout was for, echoed in events
    pub reason: String,
}

const PAYOUT_NONCE: Item<u64> = Item::new("payout_nonce");
const PENDING_PAYOUTS: Map<u64, PendingPayout> = Map::new("pending_payouts");

/// Build a redirecting native payout.
pub fn pay_native(
    storage: &mut dyn Storage,
    denom: &str,
    recipient: &Addr,
    amount: Uint128,
    reason: &str,
) -> StdResult<SubMsg> {
    let nonce = PAYOUT_NONCE.may_load(storage)?.unwrap_or_default();
    PAYOUT_NONCE.save(storage, &(nonce + 1))?;

    let id = PAYOUT_REPLY_ID_OFFSET + nonce;
    PENDING_PAYOUTS.save(
        storage,
        id,
        &PendingPayout {
            recipient: recipient.clone(),
            amount,
            reason: reason.to_string(),
        },
    )?;

    Ok(SubMsg::reply_always(
        BankMsg::Send {
            to_address: recipient.to_string(),
            amount: vec![Coin {
                denom: denom.to_string(),
                amount,
            }],
        },
        id,
    ))
}

/// Settle a payout reply.
pub fn handle_payout_reply(deps: DepsMut, msg: Reply) -> Result<Response, ContractError> {
    let payout = PENDING_PAYOUTS
        .may_load(deps.storage, msg.id)?
        .ok_or(ContractError::UnknownReply { id: msg.id })?;
    PENDING_PAYOUTS.remove(deps.storage, msg.id);

    match msg.result {
        SubMsgResult::Ok(_) => Ok(Response::new()
            .add_attribute("method", "payout")
            .add_attribute("recipient", payout.recipient)
            .add_attribute("amount", payout.amount)),
        SubMsgResult::Err(err) => {
            system_reward::credit(deps.storage, payout.amount)?;
            Ok(Response::new()
                .add_attribute("method", "payout")
                .add_event(
                    Event::new("payout_redirected")
                        .add_attribute("recipient", payout.recipient)
                        .add_attribute("amount", payout.amount)
                        .add_attribute("reason", payout.reason)
                        .add_attribute("error", err),
                ))
        }
    }
}

// ============================================================================
// Attached Funds
// ============================================================================

/// Amount of `denom` attached; any other denom is rejected.
pub fn paid_amount(info: &MessageInfo, denom: &str) -> Result<Uint128, ContractError> {
    let mut total = Uint128::zero();
    for coin in &info.funds {
        if coin.denom != denom {
            return Err(ContractError::InvalidAmount {
                reason: format!("unexpected denom {}", coin.denom),
            });
        }
        total = total.checked_add(coin.amount)?;
    }
    Ok(total)
}

/// Nonzero amount of `denom` attached.
pub fn must_pay(info: &MessageInfo, denom: &str) -> Result<Uint128, ContractError> {
    let amount = paid_amount(info, denom)?;
    if amount.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: format!("no {} sent", denom),
        });
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system_reward::pool_balance;
    use cosmwasm_std::testing::{mock_dependencies, mock_info};
    use cosmwasm_std::{coins, SubMsgResponse};

    #[test]
    fn test_failed_payout_is_redirected_to_pool() {
        let mut deps = mock_dependencies();
        let recipient = Addr::unchecked("terra1module");

        let msg = pay_native(
            deps.as_mut().storage,
            "abnb",
            &recipient,
            Uint128::new(700),
            "relayer_reward",
        )
        .unwrap();
        assert_eq!(msg.id, PAYOUT_REPLY_ID_OFFSET);

        let res = handle_payout_reply(
            deps.as_mut(),
            Reply {
                id: msg.id,
                result: SubMsgResult::Err("blocked address".to_string()),
            },
        )
        .unwrap();
        assert_eq!(res.events[0].ty, "payout_redirected");
        assert_eq!(pool_balance(deps.as_ref().storage).unwrap(), Uint128::new(700));

        // The pending record is consumed
        let err = handle_payout_reply(
            deps.as_mut(),
            Reply {
                id: msg.id,
                result: SubMsgResult::Err("again".to_string()),
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::UnknownReply { id: msg.id });
    }

    #[test]
    fn test_successful_payout_leaves_pool_untouched() {
        let mut deps = mock_dependencies();
        let recipient = Addr::unchecked("terra1fee");

        let first = pay_native(deps.as_mut().storage, "abnb", &recipient, Uint128::new(5), "a")
            .unwrap();
        let second = pay_native(deps.as_mut().storage, "abnb", &recipient, Uint128::new(6), "b")
            .unwrap();
        assert_eq!(second.id, first.id + 1);

        handle_payout_reply(
            deps.as_mut(),
            Reply {
                id: first.id,
                result: SubMsgResult::Ok(SubMsgResponse {
                    events: vec![],
                    data: None,
                }),
            },
        )
        .unwrap();
        assert_eq!(pool_balance(deps.as_ref().storage).unwrap(), Uint128::zero());
    }

    #[test]
    fn test_paid_amount_rejects_foreign_denoms() {
        let info = mock_info("terra1user", &coins(10, "uatom"));
        assert!(paid_amount(&info, "abnb").is_err());

        let info = mock_info("terra1user", &[]);
        assert_eq!(paid_amount(&info, "abnb").unwrap(), Uint128::zero());
        assert!(must_pay(&info, "abnb").is_err());
    }
}
