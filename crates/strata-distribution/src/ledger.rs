//! Typed access to every persisted distribution record.
//!
//! [`RewardLedger`] is the only code that reads or writes the distribution key
//! space. Records are CBOR-encoded under the keys described in [`crate::keys`].

use serde::{de::DeserializeOwned, Serialize};
use strata_store::{codec, KvStore};
use strata_types::records::{
    AccumulatedCommission, CurrentRewards, DelegatorStartingInfo, FeePool, HistoricalRewards,
    OutstandingRewards, SlashEvent,
};
use strata_types::{AccountId, ConsAddress, Params, ValidatorId};

use crate::keys;
use crate::Result;

pub struct RewardLedger<'s> {
    store: &'s mut dyn KvStore,
}

impl<'s> RewardLedger<'s> {
    pub fn new(store: &'s mut dyn KvStore) -> Self {
        Self { store }
    }

    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(codec::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let bytes = codec::to_vec(value)?;
        self.store.set(key, &bytes)?;
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.store.delete(key)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        self.store
            .prefix(prefix)?
            .into_iter()
            .map(|(key, bytes)| Ok((key, codec::from_slice(&bytes)?)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Params & fee pool
    // ------------------------------------------------------------------

    pub fn params(&self) -> Result<Params> {
        match self.read(keys::PARAMS_KEY)? {
            Some(params) => Ok(params),
            None => invariant_violation!("distribution params not initialised"),
        }
    }

    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        self.write(keys::PARAMS_KEY, params)
    }

    pub fn has_fee_pool(&self) -> Result<bool> {
        Ok(self.store.has(keys::FEE_POOL_KEY)?)
    }

    pub fn fee_pool(&self) -> Result<FeePool> {
        match self.read(keys::FEE_POOL_KEY)? {
            Some(pool) => Ok(pool),
            None => invariant_violation!("fee pool not initialised"),
        }
    }

    pub fn set_fee_pool(&mut self, pool: &FeePool) -> Result<()> {
        self.write(keys::FEE_POOL_KEY, pool)
    }

    pub fn previous_proposer(&self) -> Result<Option<ConsAddress>> {
        self.read(keys::PROPOSER_KEY)
    }

    pub fn set_previous_proposer(&mut self, proposer: &ConsAddress) -> Result<()> {
        self.write(keys::PROPOSER_KEY, proposer)
    }

    // ------------------------------------------------------------------
    // Withdraw addresses
    // ------------------------------------------------------------------

    /// Payout address of a delegator, defaulting to the delegator itself.
    pub fn withdraw_addr(&self, delegator: &AccountId) -> Result<AccountId> {
        Ok(self
            .read(&keys::withdraw_addr_key(delegator)?)?
            .unwrap_or_else(|| delegator.clone()))
    }

    pub fn set_withdraw_addr(&mut self, delegator: &AccountId, withdraw: &AccountId) -> Result<()> {
        self.write(&keys::withdraw_addr_key(delegator)?, withdraw)
    }

    pub fn delete_withdraw_addr(&mut self, delegator: &AccountId) -> Result<()> {
        self.remove(&keys::withdraw_addr_key(delegator)?)
    }

    /// Every explicit `(delegator, withdraw address)` override.
    pub fn withdraw_addrs(&self) -> Result<Vec<(AccountId, AccountId)>> {
        self.scan(&[keys::WITHDRAW_ADDR_PREFIX])?
            .into_iter()
            .map(|(key, addr)| Ok((keys::parse_addr_key(&key)?, addr)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Delegator starting info
    // ------------------------------------------------------------------

    pub fn delegator_starting_info(
        &self,
        validator: &ValidatorId,
        delegator: &AccountId,
    ) -> Result<Option<DelegatorStartingInfo>> {
        self.read(&keys::delegator_starting_info_key(validator, delegator)?)
    }

    pub fn has_delegator_starting_info(&self, validator: &ValidatorId, delegator: &AccountId) -> Result<bool> {
        Ok(self
            .store
            .has(&keys::delegator_starting_info_key(validator, delegator)?)?)
    }

    pub fn set_delegator_starting_info(
        &mut self,
        validator: &ValidatorId,
        delegator: &AccountId,
        info: &DelegatorStartingInfo,
    ) -> Result<()> {
        self.write(&keys::delegator_starting_info_key(validator, delegator)?, info)
    }

    pub fn delete_delegator_starting_info(&mut self, validator: &ValidatorId, delegator: &AccountId) -> Result<()> {
        self.remove(&keys::delegator_starting_info_key(validator, delegator)?)
    }

    pub fn delegator_starting_infos(&self) -> Result<Vec<(ValidatorId, AccountId, DelegatorStartingInfo)>> {
        self.scan(&[keys::DELEGATOR_STARTING_INFO_PREFIX])?
            .into_iter()
            .map(|(key, info)| {
                let (validator, delegator) = keys::parse_delegator_starting_info_key(&key)?;
                Ok((validator, delegator, info))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Historical rewards
    // ------------------------------------------------------------------

    pub fn historical_rewards(&self, validator: &ValidatorId, period: u64) -> Result<Option<HistoricalRewards>> {
        self.read(&keys::historical_rewards_key(validator, period)?)
    }

    pub fn set_historical_rewards(
        &mut self,
        validator: &ValidatorId,
        period: u64,
        rewards: &HistoricalRewards,
    ) -> Result<()> {
        self.write(&keys::historical_rewards_key(validator, period)?, rewards)
    }

    pub fn delete_historical_rewards(&mut self, validator: &ValidatorId, period: u64) -> Result<()> {
        self.remove(&keys::historical_rewards_key(validator, period)?)
    }

    /// Delete every historical record of one validator.
    pub fn delete_validator_historical_rewards(&mut self, validator: &ValidatorId) -> Result<()> {
        let entries = self.store.prefix(&keys::historical_rewards_prefix(validator)?)?;
        for (key, _) in entries {
            self.store.delete(&key)?;
        }
        Ok(())
    }

    pub fn all_historical_rewards(&self) -> Result<Vec<(ValidatorId, u64, HistoricalRewards)>> {
        self.scan(&[keys::HISTORICAL_REWARDS_PREFIX])?
            .into_iter()
            .map(|(key, rewards)| {
                let (validator, period) = keys::parse_historical_rewards_key(&key)?;
                Ok((validator, period, rewards))
            })
            .collect()
    }

    /// Sum of reference counts across every historical record.
    pub fn historical_reference_count(&self) -> Result<u64> {
        Ok(self
            .all_historical_rewards()?
            .iter()
            .map(|(_, _, h)| u64::from(h.reference_count))
            .sum())
    }

    // ------------------------------------------------------------------
    // Current rewards
    // ------------------------------------------------------------------

    pub fn current_rewards(&self, validator: &ValidatorId) -> Result<Option<CurrentRewards>> {
        self.read(&keys::current_rewards_key(validator)?)
    }

    pub fn set_current_rewards(&mut self, validator: &ValidatorId, rewards: &CurrentRewards) -> Result<()> {
        self.write(&keys::current_rewards_key(validator)?, rewards)
    }

    pub fn delete_current_rewards(&mut self, validator: &ValidatorId) -> Result<()> {
        self.remove(&keys::current_rewards_key(validator)?)
    }

    pub fn all_current_rewards(&self) -> Result<Vec<(ValidatorId, CurrentRewards)>> {
        self.scan(&[keys::CURRENT_REWARDS_PREFIX])?
            .into_iter()
            .map(|(key, rewards)| Ok((keys::parse_addr_key(&key)?, rewards)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Accumulated commission
    // ------------------------------------------------------------------

    /// Accumulated commission, zero when absent.
    pub fn accumulated_commission(&self, validator: &ValidatorId) -> Result<AccumulatedCommission> {
        Ok(self.read(&keys::commission_key(validator)?)?.unwrap_or_default())
    }

    pub fn set_accumulated_commission(
        &mut self,
        validator: &ValidatorId,
        commission: &AccumulatedCommission,
    ) -> Result<()> {
        self.write(&keys::commission_key(validator)?, commission)
    }

    pub fn delete_accumulated_commission(&mut self, validator: &ValidatorId) -> Result<()> {
        self.remove(&keys::commission_key(validator)?)
    }

    pub fn all_accumulated_commission(&self) -> Result<Vec<(ValidatorId, AccumulatedCommission)>> {
        self.scan(&[keys::COMMISSION_PREFIX])?
            .into_iter()
            .map(|(key, commission)| Ok((keys::parse_addr_key(&key)?, commission)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Outstanding rewards
    // ------------------------------------------------------------------

    /// Outstanding rewards, zero when absent.
    pub fn outstanding_rewards(&self, validator: &ValidatorId) -> Result<OutstandingRewards> {
        Ok(self
            .read(&keys::outstanding_rewards_key(validator)?)?
            .unwrap_or_default())
    }

    pub fn set_outstanding_rewards(&mut self, validator: &ValidatorId, rewards: &OutstandingRewards) -> Result<()> {
        self.write(&keys::outstanding_rewards_key(validator)?, rewards)
    }

    pub fn delete_outstanding_rewards(&mut self, validator: &ValidatorId) -> Result<()> {
        self.remove(&keys::outstanding_rewards_key(validator)?)
    }

    pub fn all_outstanding_rewards(&self) -> Result<Vec<(ValidatorId, OutstandingRewards)>> {
        self.scan(&[keys::OUTSTANDING_REWARDS_PREFIX])?
            .into_iter()
            .map(|(key, rewards)| Ok((keys::parse_addr_key(&key)?, rewards)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Slash events
    // ------------------------------------------------------------------

    pub fn validator_slash_event(
        &self,
        validator: &ValidatorId,
        height: u64,
        period: u64,
    ) -> Result<Option<SlashEvent>> {
        self.read(&keys::slash_event_key(validator, height, period)?)
    }

    pub fn set_validator_slash_event(
        &mut self,
        validator: &ValidatorId,
        height: u64,
        period: u64,
        event: &SlashEvent,
    ) -> Result<()> {
        self.write(&keys::slash_event_key(validator, height, period)?, event)
    }

    /// Slash events of one validator at heights `start..=end`, ordered by height
    /// then period.
    pub fn validator_slash_events_between(
        &self,
        validator: &ValidatorId,
        start: u64,
        end: u64,
    ) -> Result<Vec<(u64, SlashEvent)>> {
        if start > end {
            return Ok(Vec::new());
        }
        let (lower, upper) = keys::slash_events_range(validator, start, end)?;
        self.store
            .range(&lower, upper.as_deref())?
            .into_iter()
            .map(|(key, bytes)| {
                let (_, height, _) = keys::parse_slash_event_key(&key)?;
                Ok((height, codec::from_slice(&bytes)?))
            })
            .collect()
    }

    pub fn all_slash_events(&self) -> Result<Vec<(ValidatorId, u64, SlashEvent)>> {
        self.scan(&[keys::SLASH_EVENT_PREFIX])?
            .into_iter()
            .map(|(key, event)| {
                let (validator, height, _) = keys::parse_slash_event_key(&key)?;
                Ok((validator, height, event))
            })
            .collect()
    }

    pub fn delete_validator_slash_events(&mut self, validator: &ValidatorId) -> Result<()> {
        let entries = self.store.prefix(&keys::slash_events_prefix(validator)?)?;
        for (key, _) in entries {
            self.store.delete(&key)?;
        }
        Ok(())
    }
}
