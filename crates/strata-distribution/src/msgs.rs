//! Transaction messages and their handler.

use serde::{Deserialize, Serialize};
use strata_types::{AccountId, Coins, ValidatorId};

use crate::{Context, DistributionError, Keeper, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    SetWithdrawAddress {
        delegator: AccountId,
        withdraw_address: AccountId,
    },
    WithdrawDelegatorReward {
        delegator: AccountId,
        validator: ValidatorId,
    },
    WithdrawValidatorCommission {
        validator: ValidatorId,
    },
    FundCommunityPool {
        amount: Coins,
        depositor: AccountId,
    },
}

/// Coins moved by a handled message. Empty for messages that move nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgResponse {
    pub amount: Coins,
}

impl Msg {
    /// Stateless checks.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::InvalidMsg`] for empty addresses and
    /// [`DistributionError::InvalidCoins`] for an empty or malformed deposit.
    pub fn validate_basic(&self) -> Result<()> {
        match self {
            Msg::SetWithdrawAddress {
                delegator,
                withdraw_address,
            } => {
                require_address(delegator, "delegator")?;
                require_address(withdraw_address, "withdraw address")
            }
            Msg::WithdrawDelegatorReward { delegator, validator } => {
                require_address(delegator, "delegator")?;
                require_address(validator, "validator")
            }
            Msg::WithdrawValidatorCommission { validator } => require_address(validator, "validator"),
            Msg::FundCommunityPool { amount, depositor } => {
                if amount.is_zero() {
                    return Err(DistributionError::InvalidCoins("amount must be positive".to_string()));
                }
                amount
                    .validate()
                    .map_err(|e| DistributionError::InvalidCoins(e.to_string()))?;
                require_address(depositor, "depositor")
            }
        }
    }

    /// The account that must authorize this message.
    pub fn signer(&self) -> &AccountId {
        match self {
            Msg::SetWithdrawAddress { delegator, .. } => delegator,
            Msg::WithdrawDelegatorReward { delegator, .. } => delegator,
            Msg::WithdrawValidatorCommission { validator } => validator,
            Msg::FundCommunityPool { depositor, .. } => depositor,
        }
    }
}

fn require_address(address: &AccountId, what: &str) -> Result<()> {
    if address.is_empty() {
        return Err(DistributionError::InvalidMsg(format!("missing {what} address")));
    }
    Ok(())
}

impl Keeper {
    /// Validate and execute `msg` atomically. On error nothing it did is kept.
    pub fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<MsgResponse> {
        msg.validate_basic()?;
        let result = ctx.with_transaction(|tx| match msg {
            Msg::SetWithdrawAddress {
                delegator,
                withdraw_address,
            } => {
                self.set_withdraw_addr(tx, delegator, withdraw_address)?;
                Ok(MsgResponse::default())
            }
            Msg::WithdrawDelegatorReward { delegator, validator } => Ok(MsgResponse {
                amount: self.withdraw_delegation_rewards(tx, delegator, validator)?,
            }),
            Msg::WithdrawValidatorCommission { validator } => Ok(MsgResponse {
                amount: self.withdraw_validator_commission(tx, validator)?,
            }),
            Msg::FundCommunityPool { amount, depositor } => {
                self.fund_community_pool(tx, amount, depositor)?;
                Ok(MsgResponse::default())
            }
        });

        if let Err(e) = &result {
            tracing::debug!(signer = %msg.signer(), error = %e, "message rejected");
        }
        result
    }
}
