//! Staking lifecycle hooks.
//!
//! The staking module calls these around every state change that affects a
//! validator's bonded tokens or a delegation's shares. Distribution uses them to
//! end periods and re-anchor delegations so that no reward is ever computed
//! against a stake that changed mid-period.

use strata_types::{AccountId, Dec, ValidatorId};

use crate::delegation::initialize_delegation;
use crate::period::{increment_validator_period, initialize_validator};
use crate::slash::update_validator_slash_fraction;
use crate::{Context, DistributionError, Keeper, Result};

/// Callbacks fired by the staking module. Every method defaults to a no-op.
pub trait StakingHooks {
    fn after_validator_created(&self, _ctx: &mut Context<'_>, _validator: &ValidatorId) -> Result<()> {
        Ok(())
    }

    fn before_validator_modified(&self, _ctx: &mut Context<'_>, _validator: &ValidatorId) -> Result<()> {
        Ok(())
    }

    fn after_validator_removed(&self, _ctx: &mut Context<'_>, _validator: &ValidatorId) -> Result<()> {
        Ok(())
    }

    fn after_validator_bonded(&self, _ctx: &mut Context<'_>, _validator: &ValidatorId) -> Result<()> {
        Ok(())
    }

    fn after_validator_begin_unbonding(&self, _ctx: &mut Context<'_>, _validator: &ValidatorId) -> Result<()> {
        Ok(())
    }

    fn before_delegation_created(
        &self,
        _ctx: &mut Context<'_>,
        _delegator: &AccountId,
        _validator: &ValidatorId,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_shares_modified(
        &self,
        _ctx: &mut Context<'_>,
        _delegator: &AccountId,
        _validator: &ValidatorId,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_removed(
        &self,
        _ctx: &mut Context<'_>,
        _delegator: &AccountId,
        _validator: &ValidatorId,
    ) -> Result<()> {
        Ok(())
    }

    fn after_delegation_modified(
        &self,
        _ctx: &mut Context<'_>,
        _delegator: &AccountId,
        _validator: &ValidatorId,
    ) -> Result<()> {
        Ok(())
    }

    fn before_validator_slashed(&self, _ctx: &mut Context<'_>, _validator: &ValidatorId, _fraction: Dec) -> Result<()> {
        Ok(())
    }
}

impl StakingHooks for Keeper {
    fn after_validator_created(&self, ctx: &mut Context<'_>, validator: &ValidatorId) -> Result<()> {
        initialize_validator(ctx, validator)
    }

    /// Pays out the integer part of any commission, sends everything else left
    /// in outstanding to the community pool and deletes every record kept for
    /// the validator.
    fn after_validator_removed(&self, ctx: &mut Context<'_>, validator: &ValidatorId) -> Result<()> {
        let ledger = ctx.ledger();
        let mut outstanding = ledger.outstanding_rewards(validator)?.rewards;
        let commission = ledger.accumulated_commission(validator)?.commission;
        let mut pool = ledger.fee_pool()?;

        if !commission.is_zero() {
            outstanding = match outstanding.checked_sub(&commission) {
                Some(left) => left,
                None => invariant_violation!("commission of removed validator {validator} exceeds its outstanding rewards"),
            };
            let (coins, remainder) = commission.truncate_decimal()?;
            pool.community_pool = pool.community_pool.add(&remainder);
            if !coins.is_zero() {
                let withdraw_addr = ledger.withdraw_addr(validator)?;
                ctx.bank().send(self.module_account(), &withdraw_addr, &coins)?;
                tracing::debug!(validator = %validator, amount = %coins, "paid commission of removed validator");
            }
        }

        // Delegators have all been settled by now; anything left is dust.
        pool.community_pool = pool.community_pool.add(&outstanding);

        let mut ledger = ctx.ledger();
        ledger.set_fee_pool(&pool)?;
        ledger.delete_outstanding_rewards(validator)?;
        ledger.delete_accumulated_commission(validator)?;
        ledger.delete_validator_slash_events(validator)?;
        ledger.delete_validator_historical_rewards(validator)?;
        ledger.delete_current_rewards(validator)?;

        tracing::info!(validator = %validator, dust = %outstanding, "removed validator distribution records");
        Ok(())
    }

    fn before_delegation_created(
        &self,
        ctx: &mut Context<'_>,
        _delegator: &AccountId,
        validator: &ValidatorId,
    ) -> Result<()> {
        let info = ctx
            .staking()
            .validator(validator)
            .ok_or(DistributionError::NoValidatorDistInfo)?;
        increment_validator_period(ctx, &info)?;
        Ok(())
    }

    fn before_delegation_shares_modified(
        &self,
        ctx: &mut Context<'_>,
        delegator: &AccountId,
        validator: &ValidatorId,
    ) -> Result<()> {
        let staking = ctx.staking();
        let info = staking
            .validator(validator)
            .ok_or(DistributionError::NoValidatorDistInfo)?;
        let delegation = staking
            .delegation(delegator, validator)
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;
        self.settle_delegation_rewards(ctx, &info, &delegation)?;
        Ok(())
    }

    fn after_delegation_modified(
        &self,
        ctx: &mut Context<'_>,
        delegator: &AccountId,
        validator: &ValidatorId,
    ) -> Result<()> {
        initialize_delegation(ctx, validator, delegator)
    }

    fn before_validator_slashed(&self, ctx: &mut Context<'_>, validator: &ValidatorId, fraction: Dec) -> Result<()> {
        update_validator_slash_fraction(ctx, validator, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestChain;
    use strata_types::{Coins, DecCoins};

    #[test]
    fn test_created_hook_initializes_records() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                assert_eq!(ledger.current_rewards(&v)?.expect("current").period, 2);
                // Period 0 was released when the self-delegation ended period 1.
                assert!(ledger.historical_rewards(&v, 0)?.is_none());
                assert_eq!(ledger.historical_rewards(&v, 1)?.expect("anchor").reference_count, 2);
                assert!(ledger.has_delegator_starting_info(&v, &v)?);
                Ok(())
            })
            .expect("read");
    }

    #[test]
    fn test_share_change_withdraws_first() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        chain.next_block();
        chain.allocate_to_validator(&v, 20).expect("allocate");

        chain.delegate(&v, &v, 100).expect("redelegate");
        assert_eq!(chain.bank.balance_of(&v), Coins::single("stake", 20));
    }

    #[test]
    fn test_removed_validator_leaves_no_records() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::with_prec(5, 1), 100).expect("create");
        chain.next_block();
        chain.allocate_to_validator(&v, 5).expect("allocate");

        chain.undelegate(&v, &v, Dec::from(100u64)).expect("undelegate");
        let outstanding_before = chain
            .run(|_, ctx| ctx.ledger().outstanding_rewards(&v))
            .expect("read")
            .rewards;
        let pool_before = chain.run(|_, ctx| ctx.ledger().fee_pool()).expect("pool").community_pool;
        let balance_before = chain.bank.balance_of(&v);

        chain.remove_validator(&v).expect("remove");

        let paid = chain
            .bank
            .balance_of(&v)
            .checked_sub(&balance_before)
            .expect("balance grew");
        let pool_after = chain.run(|_, ctx| ctx.ledger().fee_pool()).expect("pool").community_pool;
        let swept = pool_after.checked_sub(&pool_before).expect("pool grew");
        assert_eq!(swept.add(&DecCoins::from(&paid)), outstanding_before);
        assert_eq!(paid, Coins::single("stake", 2));

        chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                assert!(ledger.current_rewards(&v)?.is_none());
                assert!(ledger.all_historical_rewards()?.is_empty());
                assert!(ledger.all_outstanding_rewards()?.is_empty());
                assert!(ledger.all_accumulated_commission()?.is_empty());
                assert!(ledger.all_slash_events()?.is_empty());
                Ok(())
            })
            .expect("read");
    }
}
