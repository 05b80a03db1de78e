//! # strata-distribution
//!
//! Fee and commission distribution for a proof-of-stake ledger.
//!
//! Rewards accrue lazily. Each validator keeps a running reward for its open
//! period; ending the period folds that reward into a cumulative per-token ratio.
//! A delegator's reward is the ratio difference between the period its stake was
//! anchored at and the period its withdrawal ends, times its stake, adjusted for
//! any slashes in between. No operation iterates over delegators.
//!
//! ## Modules
//!
//! - [`context`]: explicit per-block handle over store, staking and bank
//! - [`expected`]: interfaces consumed from the staking and bank modules
//! - [`keys`]: store key layout
//! - [`ledger`]: typed CRUD over every persisted record
//! - [`period`]: validator period transitions and historical reference counts
//! - [`slash`]: slash event log
//! - [`allocation`]: per-block fee allocation
//! - [`delegation`]: delegator reward calculation and withdrawal
//! - [`keeper`]: the public distribution keeper
//! - [`hooks`]: staking lifecycle hooks
//! - [`invariants`]: ledger consistency checks
//! - [`queries`]: read-only projections
//! - [`events`]: events emitted on the context
//! - [`msgs`]: transaction messages and their handler

/// Abort block processing: the ledger is in a state no valid sequence of
/// operations can produce.
macro_rules! invariant_violation {
    ($($arg:tt)*) => {
        $crate::abort_corrupted(format_args!($($arg)*))
    };
}

pub mod allocation;
pub mod context;
pub mod delegation;
pub mod events;
pub mod expected;
pub mod hooks;
pub mod invariants;
pub mod keeper;
pub mod keys;
pub mod ledger;
pub mod msgs;
pub mod period;
pub mod queries;
pub mod slash;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use context::Context;
pub use expected::{BankError, BankKeeper, DelegationInfo, StakingKeeper, ValidatorInfo};
pub use hooks::StakingHooks;
pub use keeper::Keeper;
pub use ledger::RewardLedger;
pub use msgs::Msg;

use strata_store::StoreError;
use strata_types::{AccountId, TypesError};

/// Name of the distribution module account.
pub const MODULE_NAME: &str = "distribution";

/// Recoverable distribution errors. Each aborts only the operation that raised it.
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    /// The validator has no distribution records.
    #[error("no validator distribution info")]
    NoValidatorDistInfo,

    /// The delegation has no starting info.
    #[error("no delegation distribution info")]
    EmptyDelegationDistInfo,

    /// Accumulated commission is zero.
    #[error("no validator commission to withdraw")]
    NoValidatorCommission,

    /// The community pool cannot cover a requested spend.
    #[error("community pool does not have sufficient coins to distribute")]
    BadDistribution,

    /// Withdraw address redirection is disabled by params.
    #[error("set withdraw address disabled")]
    SetWithdrawAddrDisabled,

    /// The requested withdraw address may not receive external funds.
    #[error("{0} is not allowed to receive external funds")]
    WithdrawAddrBlacklisted(AccountId),

    /// A coin amount failed validation.
    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    /// A message failed stateless validation.
    #[error("invalid message: {0}")]
    InvalidMsg(String),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DistributionError>;

#[doc(hidden)]
#[cold]
#[track_caller]
#[allow(clippy::panic)]
pub fn abort_corrupted(args: std::fmt::Arguments<'_>) -> ! {
    tracing::error!("distribution ledger corrupted: {args}");
    panic!("distribution ledger corrupted: {args}");
}
