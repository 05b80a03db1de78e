//! Persisted distribution ledger records.
//!
//! One record type per key family. A validator accrues rewards in periods:
//!
//! ```text
//! period p ends  ->  historical[p].ratio = historical[p-1].ratio + current.rewards / tokens
//! delegator owed ->  (historical[end].ratio - historical[start].ratio) x stake
//! ```

use serde::{Deserialize, Serialize};

use crate::coins::DecCoins;
use crate::decimal::Dec;

/// Cumulative reward ratio of a validator as of the end of a period.
///
/// `reference_count` counts the anchors that may still diff against this record:
/// the following period, delegations starting here and slash events recorded here.
/// It stays within `0..=2`; the record is deleted when it drops to zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRewards {
    pub cumulative_reward_ratio: DecCoins,
    pub reference_count: u8,
}

/// Rewards accrued during the validator's still-open period.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRewards {
    pub rewards: DecCoins,
    pub period: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedCommission {
    pub commission: DecCoins,
}

/// Everything allocated to a validator and not yet paid out: commission plus
/// all unwithdrawn delegation rewards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingRewards {
    pub rewards: DecCoins,
}

/// Where a delegation's accrual window starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfo {
    pub previous_period: u64,
    pub stake: Dec,
    pub height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashEvent {
    pub validator_period: u64,
    pub fraction: Dec,
}

/// Global pool of funds not attributable to any validator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePool {
    pub community_pool: DecCoins,
}
