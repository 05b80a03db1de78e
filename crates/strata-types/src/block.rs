//! Per-block inputs handed to the distribution engine.

use serde::{Deserialize, Serialize};

use crate::account::ConsAddress;

/// One validator's entry in the previous block's commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub address: ConsAddress,
    pub power: i64,
    pub signed_last_block: bool,
}
