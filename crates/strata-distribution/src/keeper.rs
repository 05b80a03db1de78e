//! The distribution keeper.
//!
//! [`Keeper`] holds the module's static configuration (its module account, the
//! fee collector it drains each block, and the accounts barred from receiving
//! payouts). All state lives in the store reached through [`Context`].

use std::collections::BTreeSet;

use strata_types::records::FeePool;
use strata_types::{AccountId, Coins, DecCoins, Params, ValidatorId};

use crate::delegation::initialize_delegation;
use crate::events::{self, Event};
use crate::{Context, DistributionError, Result, MODULE_NAME};

/// Default name of the account that collects transaction fees.
pub const FEE_COLLECTOR_NAME: &str = "fee_collector";

#[derive(Debug, Clone)]
pub struct Keeper {
    module_account: AccountId,
    fee_collector: AccountId,
    blacklisted: BTreeSet<AccountId>,
}

impl Default for Keeper {
    fn default() -> Self {
        Self::new(AccountId::from(MODULE_NAME), AccountId::from(FEE_COLLECTOR_NAME))
    }
}

impl Keeper {
    /// The module account itself is always barred from receiving payouts.
    pub fn new(module_account: AccountId, fee_collector: AccountId) -> Self {
        Self {
            blacklisted: BTreeSet::from([module_account.clone()]),
            module_account,
            fee_collector,
        }
    }

    /// Bar `account` from being set as a withdraw address.
    pub fn with_blacklisted(mut self, account: AccountId) -> Self {
        self.blacklisted.insert(account);
        self
    }

    pub fn module_account(&self) -> &AccountId {
        &self.module_account
    }

    pub fn fee_collector(&self) -> &AccountId {
        &self.fee_collector
    }

    pub fn is_blacklisted(&self, account: &AccountId) -> bool {
        self.blacklisted.contains(account)
    }

    /// Store validated params and an empty fee pool.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::Types`] if `params` fail validation.
    pub fn initialize(&self, ctx: &mut Context<'_>, params: &Params) -> Result<()> {
        params.validate()?;
        let mut ledger = ctx.ledger();
        ledger.set_params(params)?;
        if !ledger.has_fee_pool()? {
            ledger.set_fee_pool(&FeePool::default())?;
        }
        tracing::info!(
            community_tax = %params.community_tax,
            base_proposer_reward = %params.base_proposer_reward,
            bonus_proposer_reward = %params.bonus_proposer_reward,
            "distribution initialized"
        );
        Ok(())
    }

    /// Replace the params after validating them.
    pub fn set_params(&self, ctx: &mut Context<'_>, params: &Params) -> Result<()> {
        params.validate()?;
        ctx.ledger().set_params(params)
    }

    /// Redirect a delegator's payouts.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::WithdrawAddrBlacklisted`] if `withdraw` may not receive funds
    /// - [`DistributionError::SetWithdrawAddrDisabled`] if redirection is disabled
    pub fn set_withdraw_addr(&self, ctx: &mut Context<'_>, delegator: &AccountId, withdraw: &AccountId) -> Result<()> {
        if self.is_blacklisted(withdraw) {
            return Err(DistributionError::WithdrawAddrBlacklisted(withdraw.clone()));
        }
        if !ctx.ledger().params()?.withdraw_addr_enabled {
            return Err(DistributionError::SetWithdrawAddrDisabled);
        }

        ctx.emit(Event::new(events::EVENT_TYPE_SET_WITHDRAW_ADDRESS).attr(events::ATTRIBUTE_KEY_WITHDRAW_ADDRESS, withdraw));
        ctx.ledger().set_withdraw_addr(delegator, withdraw)
    }

    /// Withdraw a delegation's rewards and re-anchor it at the current period.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NoValidatorDistInfo`] if the validator does not exist
    /// - [`DistributionError::EmptyDelegationDistInfo`] if the delegation does not exist
    pub fn withdraw_delegation_rewards(
        &self,
        ctx: &mut Context<'_>,
        delegator: &AccountId,
        validator: &ValidatorId,
    ) -> Result<Coins> {
        let staking = ctx.staking();
        let info = staking
            .validator(validator)
            .ok_or(DistributionError::NoValidatorDistInfo)?;
        let delegation = staking
            .delegation(delegator, validator)
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;

        let rewards = self.settle_delegation_rewards(ctx, &info, &delegation)?;
        ctx.emit(
            Event::new(events::EVENT_TYPE_WITHDRAW_REWARDS)
                .attr(events::ATTRIBUTE_KEY_AMOUNT, &rewards)
                .attr(events::ATTRIBUTE_KEY_VALIDATOR, validator),
        );

        initialize_delegation(ctx, validator, delegator)?;
        Ok(rewards)
    }

    /// Pay out the integer part of a validator's accumulated commission.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::NoValidatorCommission`] if no commission has accrued.
    pub fn withdraw_validator_commission(&self, ctx: &mut Context<'_>, validator: &ValidatorId) -> Result<Coins> {
        let mut ledger = ctx.ledger();
        let mut accumulated = ledger.accumulated_commission(validator)?;
        if accumulated.commission.is_zero() {
            return Err(DistributionError::NoValidatorCommission);
        }

        let (commission, remainder) = accumulated.commission.truncate_decimal()?;
        accumulated.commission = remainder;
        ledger.set_accumulated_commission(validator, &accumulated)?;

        let mut outstanding = ledger.outstanding_rewards(validator)?;
        outstanding.rewards = match outstanding.rewards.checked_sub(&DecCoins::from(&commission)) {
            Some(left) => left,
            None => invariant_violation!("outstanding rewards of {validator} would go negative"),
        };
        ledger.set_outstanding_rewards(validator, &outstanding)?;

        if !commission.is_zero() {
            let withdraw_addr = ledger.withdraw_addr(validator)?;
            ctx.bank().send(&self.module_account, &withdraw_addr, &commission)?;
        }

        ctx.emit(
            Event::new(events::EVENT_TYPE_WITHDRAW_COMMISSION).attr(events::ATTRIBUTE_KEY_AMOUNT, &commission),
        );
        tracing::debug!(validator = %validator, amount = %commission, "withdrew validator commission");
        Ok(commission)
    }

    /// Move `amount` from `depositor` into the community pool.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::InvalidCoins`] for an empty or malformed amount,
    /// or [`DistributionError::Bank`] if the depositor cannot cover it.
    pub fn fund_community_pool(&self, ctx: &mut Context<'_>, amount: &Coins, depositor: &AccountId) -> Result<()> {
        if amount.is_zero() {
            return Err(DistributionError::InvalidCoins("amount must be positive".to_string()));
        }
        amount
            .validate()
            .map_err(|e| DistributionError::InvalidCoins(e.to_string()))?;

        ctx.bank().send(depositor, &self.module_account, amount)?;

        let mut ledger = ctx.ledger();
        let mut pool = ledger.fee_pool()?;
        pool.community_pool = pool.community_pool.add(&DecCoins::from(amount));
        ledger.set_fee_pool(&pool)?;

        ctx.emit(
            Event::new(events::EVENT_TYPE_FUND_COMMUNITY_POOL)
                .attr(events::ATTRIBUTE_KEY_SENDER, depositor)
                .attr(events::ATTRIBUTE_KEY_AMOUNT, amount),
        );
        Ok(())
    }

    /// Pay `amount` out of the community pool to `receiver`.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::BadDistribution`] if the pool cannot cover it.
    pub fn distribute_from_fee_pool(&self, ctx: &mut Context<'_>, amount: &Coins, receiver: &AccountId) -> Result<()> {
        let mut ledger = ctx.ledger();
        let mut pool = ledger.fee_pool()?;
        let (left, negative) = pool.community_pool.safe_sub(&DecCoins::from(amount));
        if negative {
            return Err(DistributionError::BadDistribution);
        }
        pool.community_pool = left;
        ledger.set_fee_pool(&pool)?;

        ctx.bank().send(&self.module_account, receiver, amount)?;
        ctx.emit(
            Event::new(events::EVENT_TYPE_COMMUNITY_POOL_SPEND)
                .attr(events::ATTRIBUTE_KEY_RECIPIENT, receiver)
                .attr(events::ATTRIBUTE_KEY_AMOUNT, amount),
        );
        tracing::info!(recipient = %receiver, amount = %amount, "transferred from the community pool");
        Ok(())
    }

    /// Sum of every validator's outstanding rewards.
    pub fn total_rewards(&self, ctx: &mut Context<'_>) -> Result<DecCoins> {
        Ok(ctx
            .ledger()
            .all_outstanding_rewards()?
            .iter()
            .fold(DecCoins::new(), |acc, (_, o)| acc.add(&o.rewards)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestChain;
    use strata_types::Dec;

    fn stake(n: u64) -> Coins {
        Coins::single("stake", n)
    }

    #[test]
    fn test_initialize_rejects_invalid_params() {
        let mut chain = TestChain::new();
        let mut params = Params::default();
        params.community_tax = Dec::from(2u64);
        let result = chain.run(|keeper, ctx| keeper.initialize(ctx, &params));
        assert!(matches!(result, Err(DistributionError::Types(_))));
    }

    #[test]
    fn test_set_withdraw_addr() {
        let mut chain = TestChain::new();
        let alice = AccountId::from("alice");
        let cold = AccountId::from("cold");
        chain.run(|keeper, ctx| keeper.set_withdraw_addr(ctx, &alice, &cold)).expect("set");
        let stored = chain.run(|_, ctx| ctx.ledger().withdraw_addr(&alice)).expect("read");
        assert_eq!(stored, cold);
    }

    #[test]
    fn test_set_withdraw_addr_disabled() {
        let mut chain = TestChain::new();
        let params = Params {
            withdraw_addr_enabled: false,
            ..Params::default()
        };
        chain.run(|keeper, ctx| keeper.set_params(ctx, &params)).expect("params");
        let result = chain.run(|keeper, ctx| keeper.set_withdraw_addr(ctx, &"alice".into(), &"cold".into()));
        assert!(matches!(result, Err(DistributionError::SetWithdrawAddrDisabled)));
    }

    #[test]
    fn test_set_withdraw_addr_blacklisted() {
        let mut chain = TestChain::new();
        let module = chain.keeper.module_account().clone();
        let result = chain.run(|keeper, ctx| keeper.set_withdraw_addr(ctx, &"alice".into(), &module));
        assert!(matches!(result, Err(DistributionError::WithdrawAddrBlacklisted(_))));
    }

    #[test]
    fn test_withdraw_commission_keeps_remainder() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::with_prec(5, 1), 100).expect("create");
        chain.next_block();
        chain.allocate_to_validator(&v, 3).expect("allocate");

        let paid = chain
            .run(|keeper, ctx| keeper.withdraw_validator_commission(ctx, &v))
            .expect("withdraw");
        assert_eq!(paid, stake(1));
        assert_eq!(chain.bank.balance_of(&v), stake(1));

        let (commission, outstanding) = chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                Ok((ledger.accumulated_commission(&v)?, ledger.outstanding_rewards(&v)?))
            })
            .expect("read");
        assert_eq!(commission.commission.amount_of("stake"), Dec::with_prec(5, 1));
        assert_eq!(outstanding.rewards.amount_of("stake"), Dec::from(2u64));
    }

    #[test]
    fn test_withdraw_commission_when_empty() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::with_prec(5, 1), 100).expect("create");
        let result = chain.run(|keeper, ctx| keeper.withdraw_validator_commission(ctx, &v));
        assert!(matches!(result, Err(DistributionError::NoValidatorCommission)));
    }

    #[test]
    fn test_withdraw_unknown_delegation() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        let result = chain.run(|keeper, ctx| keeper.withdraw_delegation_rewards(ctx, &"nobody".into(), &v));
        assert!(matches!(result, Err(DistributionError::EmptyDelegationDistInfo)));
        let result = chain.run(|keeper, ctx| keeper.withdraw_delegation_rewards(ctx, &v, &"ghost".into()));
        assert!(matches!(result, Err(DistributionError::NoValidatorDistInfo)));
    }

    #[test]
    fn test_fund_and_spend_community_pool() {
        let mut chain = TestChain::new();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        chain.bank.mint(&alice, &stake(100));

        chain
            .run(|keeper, ctx| keeper.fund_community_pool(ctx, &stake(40), &alice))
            .expect("fund");
        assert_eq!(chain.bank.balance_of(&alice), stake(60));

        let result = chain.run(|keeper, ctx| keeper.distribute_from_fee_pool(ctx, &stake(41), &bob));
        assert!(matches!(result, Err(DistributionError::BadDistribution)));

        chain
            .run(|keeper, ctx| keeper.distribute_from_fee_pool(ctx, &stake(15), &bob))
            .expect("spend");
        assert_eq!(chain.bank.balance_of(&bob), stake(15));
        let pool = chain.run(|_, ctx| ctx.ledger().fee_pool()).expect("pool");
        assert_eq!(pool.community_pool.amount_of("stake"), Dec::from(25u64));
    }

    #[test]
    fn test_fund_community_pool_rejects_empty() {
        let mut chain = TestChain::new();
        let result = chain.run(|keeper, ctx| keeper.fund_community_pool(ctx, &Coins::new(), &"alice".into()));
        assert!(matches!(result, Err(DistributionError::InvalidCoins(_))));
    }
}
