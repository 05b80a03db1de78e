//! Store key layout.
//!
//! ```text
//! 0x00                                  -> FeePool
//! 0x01                                  -> previous proposer ConsAddress
//! 0x02 | addr(val)                      -> OutstandingRewards
//! 0x03 | addr(del)                      -> withdraw AccountId
//! 0x04 | addr(val) | addr(del)          -> DelegatorStartingInfo
//! 0x05 | addr(val) | period             -> HistoricalRewards
//! 0x06 | addr(val)                      -> CurrentRewards
//! 0x07 | addr(val)                      -> AccumulatedCommission
//! 0x08 | addr(val) | height | period    -> SlashEvent
//! 0x09                                  -> Params
//! ```
//!
//! `addr(x)` is a big-endian `u16` length followed by the address bytes, so one
//! validator's records never share a prefix with another's. Heights and periods
//! are big-endian `u64`, which makes byte order match numeric order.

use strata_store::{prefix_end, StoreError};
use strata_types::{AccountId, TypesError, ValidatorId};

use crate::Result;

pub const FEE_POOL_KEY: &[u8] = &[0x00];
pub const PROPOSER_KEY: &[u8] = &[0x01];
pub const OUTSTANDING_REWARDS_PREFIX: u8 = 0x02;
pub const WITHDRAW_ADDR_PREFIX: u8 = 0x03;
pub const DELEGATOR_STARTING_INFO_PREFIX: u8 = 0x04;
pub const HISTORICAL_REWARDS_PREFIX: u8 = 0x05;
pub const CURRENT_REWARDS_PREFIX: u8 = 0x06;
pub const COMMISSION_PREFIX: u8 = 0x07;
pub const SLASH_EVENT_PREFIX: u8 = 0x08;
pub const PARAMS_KEY: &[u8] = &[0x09];

fn push_addr(key: &mut Vec<u8>, addr: &AccountId) -> Result<()> {
    let bytes = addr.as_str().as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| {
        TypesError::InvalidAddress(format!("address of {} bytes exceeds the {} byte key limit", bytes.len(), u16::MAX))
    })?;
    key.extend_from_slice(&len.to_be_bytes());
    key.extend_from_slice(bytes);
    Ok(())
}

fn addr_key(prefix: u8, addr: &AccountId) -> Result<Vec<u8>> {
    let mut key = vec![prefix];
    push_addr(&mut key, addr)?;
    Ok(key)
}

pub fn outstanding_rewards_key(validator: &ValidatorId) -> Result<Vec<u8>> {
    addr_key(OUTSTANDING_REWARDS_PREFIX, validator)
}

pub fn withdraw_addr_key(delegator: &AccountId) -> Result<Vec<u8>> {
    addr_key(WITHDRAW_ADDR_PREFIX, delegator)
}

pub fn delegator_starting_info_key(validator: &ValidatorId, delegator: &AccountId) -> Result<Vec<u8>> {
    let mut key = addr_key(DELEGATOR_STARTING_INFO_PREFIX, validator)?;
    push_addr(&mut key, delegator)?;
    Ok(key)
}

pub fn historical_rewards_prefix(validator: &ValidatorId) -> Result<Vec<u8>> {
    addr_key(HISTORICAL_REWARDS_PREFIX, validator)
}

pub fn historical_rewards_key(validator: &ValidatorId, period: u64) -> Result<Vec<u8>> {
    let mut key = historical_rewards_prefix(validator)?;
    key.extend_from_slice(&period.to_be_bytes());
    Ok(key)
}

pub fn current_rewards_key(validator: &ValidatorId) -> Result<Vec<u8>> {
    addr_key(CURRENT_REWARDS_PREFIX, validator)
}

pub fn commission_key(validator: &ValidatorId) -> Result<Vec<u8>> {
    addr_key(COMMISSION_PREFIX, validator)
}

pub fn slash_events_prefix(validator: &ValidatorId) -> Result<Vec<u8>> {
    addr_key(SLASH_EVENT_PREFIX, validator)
}

pub fn slash_events_height_key(validator: &ValidatorId, height: u64) -> Result<Vec<u8>> {
    let mut key = slash_events_prefix(validator)?;
    key.extend_from_slice(&height.to_be_bytes());
    Ok(key)
}

pub fn slash_event_key(validator: &ValidatorId, height: u64, period: u64) -> Result<Vec<u8>> {
    let mut key = slash_events_height_key(validator, height)?;
    key.extend_from_slice(&period.to_be_bytes());
    Ok(key)
}

/// Half-open key range covering slash events at heights `start..=end`.
pub fn slash_events_range(validator: &ValidatorId, start: u64, end: u64) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
    let lower = slash_events_height_key(validator, start)?;
    let upper = match end.checked_add(1) {
        Some(next) => Some(slash_events_height_key(validator, next)?),
        None => prefix_end(&slash_events_prefix(validator)?),
    };
    Ok((lower, upper))
}

fn malformed(key: &[u8]) -> StoreError {
    StoreError::Deserialization(format!("malformed distribution key {key:02x?}"))
}

fn take_addr<'k>(key: &[u8], rest: &'k [u8]) -> Result<(AccountId, &'k [u8])> {
    let (len, rest) = rest.split_first_chunk::<2>().ok_or_else(|| malformed(key))?;
    let len = usize::from(u16::from_be_bytes(*len));
    if rest.len() < len {
        return Err(malformed(key).into());
    }
    let (addr, rest) = rest.split_at(len);
    let addr = std::str::from_utf8(addr).map_err(|_| malformed(key))?;
    Ok((AccountId::new(addr), rest))
}

fn take_u64<'k>(key: &[u8], rest: &'k [u8]) -> Result<(u64, &'k [u8])> {
    let (bytes, rest) = rest.split_first_chunk::<8>().ok_or_else(|| malformed(key))?;
    Ok((u64::from_be_bytes(*bytes), rest))
}

fn body(key: &[u8]) -> Result<&[u8]> {
    key.get(1..).ok_or_else(|| malformed(key).into())
}

/// Address of a `prefix | addr` key.
pub fn parse_addr_key(key: &[u8]) -> Result<AccountId> {
    let (addr, rest) = take_addr(key, body(key)?)?;
    if !rest.is_empty() {
        return Err(malformed(key).into());
    }
    Ok(addr)
}

/// `(validator, delegator)` of a starting-info key.
pub fn parse_delegator_starting_info_key(key: &[u8]) -> Result<(ValidatorId, AccountId)> {
    let (validator, rest) = take_addr(key, body(key)?)?;
    let (delegator, _) = take_addr(key, rest)?;
    Ok((validator, delegator))
}

/// `(validator, period)` of a historical rewards key.
pub fn parse_historical_rewards_key(key: &[u8]) -> Result<(ValidatorId, u64)> {
    let (validator, rest) = take_addr(key, body(key)?)?;
    let (period, _) = take_u64(key, rest)?;
    Ok((validator, period))
}

/// `(validator, height, period)` of a slash event key.
pub fn parse_slash_event_key(key: &[u8]) -> Result<(ValidatorId, u64, u64)> {
    let (validator, rest) = take_addr(key, body(key)?)?;
    let (height, rest) = take_u64(key, rest)?;
    let (period, _) = take_u64(key, rest)?;
    Ok((validator, height, period))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys() {
        let val = AccountId::from("valoper1");
        let del = AccountId::from("del1");

        let key = delegator_starting_info_key(&val, &del).expect("key");
        assert_eq!(parse_delegator_starting_info_key(&key).expect("parse"), (val.clone(), del.clone()));

        let key = historical_rewards_key(&val, 42).expect("key");
        assert_eq!(parse_historical_rewards_key(&key).expect("parse"), (val.clone(), 42));

        let key = slash_event_key(&val, 7, 3).expect("key");
        assert_eq!(parse_slash_event_key(&key).expect("parse"), (val.clone(), 7, 3));

        assert_eq!(parse_addr_key(&commission_key(&val).expect("key")).expect("parse"), val);
    }

    #[test]
    fn test_validator_prefixes_do_not_overlap() {
        // "val" must not be a byte prefix of "val2" once length-prefixed.
        let short = historical_rewards_prefix(&AccountId::from("val")).expect("prefix");
        let long = historical_rewards_key(&AccountId::from("val2"), 0).expect("key");
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn test_height_order_matches_byte_order() {
        let val = AccountId::from("v");
        assert!(slash_event_key(&val, 255, 9).expect("key") < slash_event_key(&val, 256, 1).expect("key"));
        let (lo, hi) = slash_events_range(&val, 10, 10).expect("range");
        let key = slash_event_key(&val, 10, 99).expect("key");
        assert!(key >= lo && Some(key) < hi);
    }

    #[test]
    fn test_malformed_key_rejected() {
        assert!(parse_historical_rewards_key(&[HISTORICAL_REWARDS_PREFIX, 0x00]).is_err());
        assert!(parse_addr_key(&[]).is_err());
    }

    #[test]
    fn test_oversized_address_rejected() {
        let longest = AccountId::new("a".repeat(usize::from(u16::MAX)));
        let key = commission_key(&longest).expect("fits");
        assert_eq!(parse_addr_key(&key).expect("parse"), longest);

        let oversized = AccountId::new("a".repeat(usize::from(u16::MAX) + 1));
        assert!(matches!(
            commission_key(&oversized),
            Err(crate::DistributionError::Types(TypesError::InvalidAddress(_)))
        ));
        assert!(delegator_starting_info_key(&longest, &oversized).is_err());
    }
}
