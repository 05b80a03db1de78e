//! Interfaces consumed from the staking and bank modules.

use serde::{Deserialize, Serialize};
use strata_types::{AccountId, Coins, ConsAddress, Dec, ValidatorId};

/// Snapshot of a validator as seen by distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub operator: ValidatorId,
    pub cons_address: ConsAddress,
    /// Bonded tokens backing all of the validator's delegator shares.
    pub tokens: u64,
    pub delegator_shares: Dec,
    pub commission_rate: Dec,
}

impl ValidatorInfo {
    /// Token value of `shares`, rounded half-to-even.
    pub fn tokens_from_shares(&self, shares: &Dec) -> Dec {
        shares
            .mul(&Dec::from(self.tokens))
            .quo(&self.delegator_shares)
            .unwrap_or_default()
    }

    /// Token value of `shares`, truncated.
    pub fn tokens_from_shares_truncated(&self, shares: &Dec) -> Dec {
        shares
            .mul(&Dec::from(self.tokens))
            .quo_truncate(&self.delegator_shares)
            .unwrap_or_default()
    }

    /// Shares issued for a deposit of `amount` tokens.
    pub fn shares_from_tokens(&self, amount: u64) -> Dec {
        if self.tokens == 0 || self.delegator_shares.is_zero() {
            return Dec::from(amount);
        }
        self.delegator_shares
            .mul(&Dec::from(amount))
            .quo_truncate(&Dec::from(self.tokens))
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationInfo {
    pub delegator: AccountId,
    pub validator: ValidatorId,
    pub shares: Dec,
}

/// Read access to validators and delegations.
pub trait StakingKeeper {
    fn validator(&self, operator: &ValidatorId) -> Option<ValidatorInfo>;

    fn validator_by_cons_addr(&self, address: &ConsAddress) -> Option<ValidatorInfo>;

    fn delegation(&self, delegator: &AccountId, validator: &ValidatorId) -> Option<DelegationInfo>;

    /// Every validator, in operator order.
    fn validators(&self) -> Vec<ValidatorInfo>;

    /// Every delegation, ordered by validator then delegator.
    fn delegations(&self) -> Vec<DelegationInfo>;

    fn delegator_delegations(&self, delegator: &AccountId) -> Vec<DelegationInfo>;

    fn validator_delegations(&self, validator: &ValidatorId) -> Vec<DelegationInfo> {
        self.delegations()
            .into_iter()
            .filter(|d| &d.validator == validator)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BankError {
    #[error("insufficient funds: {account} has {available}, needs {required}")]
    InsufficientFunds {
        account: AccountId,
        available: Coins,
        required: Coins,
    },

    #[error("balance overflow for {0}")]
    Overflow(AccountId),
}

/// Token custody.
pub trait BankKeeper {
    fn balance(&self, account: &AccountId) -> Coins;

    /// Move `amount` from `from` to `to`, failing without effect if `from`
    /// cannot cover it.
    fn send(&mut self, from: &AccountId, to: &AccountId, amount: &Coins) -> Result<(), BankError>;
}
