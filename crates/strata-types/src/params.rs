//! Distribution parameters.

use serde::{Deserialize, Serialize};

use crate::decimal::Dec;
use crate::{Result, TypesError};

/// Governance-controlled distribution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Fraction of every block's fees credited to the community pool.
    #[serde(default = "default_community_tax")]
    pub community_tax: Dec,
    /// Fixed fraction of fees paid to the block proposer.
    #[serde(default = "default_base_proposer_reward")]
    pub base_proposer_reward: Dec,
    /// Extra proposer fraction, scaled by the share of power that precommitted.
    #[serde(default = "default_bonus_proposer_reward")]
    pub bonus_proposer_reward: Dec,
    /// Whether delegators may redirect payouts to another address.
    #[serde(default = "default_true")]
    pub withdraw_addr_enabled: bool,
}

fn default_community_tax() -> Dec {
    Dec::with_prec(2, 2)
}

fn default_base_proposer_reward() -> Dec {
    Dec::with_prec(1, 2)
}

fn default_bonus_proposer_reward() -> Dec {
    Dec::with_prec(4, 2)
}

fn default_true() -> bool {
    true
}

impl Default for Params {
    fn default() -> Self {
        Self {
            community_tax: default_community_tax(),
            base_proposer_reward: default_base_proposer_reward(),
            bonus_proposer_reward: default_bonus_proposer_reward(),
            withdraw_addr_enabled: true,
        }
    }
}

impl Params {
    /// Check that every fraction is in range and that the proposer rewards and
    /// tax together never exceed the fees of a block.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidParams`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.community_tax.is_negative() || self.community_tax > Dec::one() {
            return Err(TypesError::InvalidParams(format!(
                "community tax should be between 0 and 1: {}",
                self.community_tax
            )));
        }
        if self.base_proposer_reward.is_negative() {
            return Err(TypesError::InvalidParams(format!(
                "base proposer reward should be positive: {}",
                self.base_proposer_reward
            )));
        }
        if self.bonus_proposer_reward.is_negative() {
            return Err(TypesError::InvalidParams(format!(
                "bonus proposer reward should be positive: {}",
                self.bonus_proposer_reward
            )));
        }
        let total = &(&self.base_proposer_reward + &self.bonus_proposer_reward) + &self.community_tax;
        if total > Dec::one() {
            return Err(TypesError::InvalidParams(format!(
                "sum of base, bonus proposer rewards, and community tax cannot be greater than one: {total}"
            )));
        }
        Ok(())
    }
}
