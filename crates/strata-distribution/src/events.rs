//! Events emitted by distribution operations.
//!
//! Events are collected on the [`Context`](crate::Context) in emission order and
//! survive only if the surrounding transaction commits.

use serde::{Deserialize, Serialize};

pub const EVENT_TYPE_SET_WITHDRAW_ADDRESS: &str = "set_withdraw_address";
pub const EVENT_TYPE_REWARDS: &str = "rewards";
pub const EVENT_TYPE_COMMISSION: &str = "commission";
pub const EVENT_TYPE_PROPOSER_REWARD: &str = "proposer_reward";
pub const EVENT_TYPE_WITHDRAW_REWARDS: &str = "withdraw_rewards";
pub const EVENT_TYPE_WITHDRAW_COMMISSION: &str = "withdraw_commission";
pub const EVENT_TYPE_FUND_COMMUNITY_POOL: &str = "fund_community_pool";
pub const EVENT_TYPE_COMMUNITY_POOL_SPEND: &str = "community_pool_spend";

pub const ATTRIBUTE_KEY_WITHDRAW_ADDRESS: &str = "withdraw_address";
pub const ATTRIBUTE_KEY_VALIDATOR: &str = "validator";
pub const ATTRIBUTE_KEY_DELEGATOR: &str = "delegator";
pub const ATTRIBUTE_KEY_AMOUNT: &str = "amount";
pub const ATTRIBUTE_KEY_SENDER: &str = "sender";
pub const ATTRIBUTE_KEY_RECIPIENT: &str = "recipient";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
