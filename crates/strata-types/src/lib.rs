//! # strata-types
//!
//! Shared value types for the Strata reward distribution engine.
//!
//! ## Modules
//!
//! - [`decimal`]: 18-digit fixed-precision decimal with rounding and truncating arithmetic
//! - [`coins`]: integer ([`Coins`]) and decimal ([`DecCoins`]) multi-denomination vectors
//! - [`account`]: account and consensus addresses
//! - [`records`]: persisted distribution ledger records
//! - [`params`]: distribution parameters and their validation
//! - [`block`]: per-block inputs (votes from the previous commit)

pub mod account;
pub mod block;
pub mod coins;
pub mod decimal;
pub mod params;
pub mod records;

pub use account::{AccountId, ConsAddress, ValidatorId};
pub use block::VoteInfo;
pub use coins::{Coins, DecCoins};
pub use decimal::Dec;
pub use params::Params;

/// Default staking and fee denomination used by tooling.
pub const BOND_DENOM: &str = "stake";

/// Error types for value construction and validation.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A decimal string could not be parsed or has too many fractional digits.
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    /// A denomination does not match `[a-z][a-z0-9/]{2,127}`.
    #[error("invalid denom: {0}")]
    InvalidDenom(String),

    /// A parameter is outside its allowed range.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// An address could not be decoded.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// An integer amount does not fit the target representation.
    #[error("amount overflow: {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
