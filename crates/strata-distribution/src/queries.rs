//! Read-only projections over the ledger.
//!
//! Reward queries end the validator's period inside a discarded overlay, so
//! they report exactly what a withdrawal at this height would pay without
//! mutating anything.

use serde::{Deserialize, Serialize};
use strata_types::records::SlashEvent;
use strata_types::{AccountId, DecCoins, Params, ValidatorId};

use crate::delegation::calculate_delegation_rewards;
use crate::period::increment_validator_period;
use crate::{Context, DistributionError, Keeper, Result};

/// Pending reward of one delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationDelegatorReward {
    pub validator: ValidatorId,
    pub reward: DecCoins,
}

/// Pending rewards of every delegation held by a delegator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorTotalRewards {
    pub rewards: Vec<DelegationDelegatorReward>,
    pub total: DecCoins,
}

impl Keeper {
    pub fn query_params(&self, ctx: &mut Context<'_>) -> Result<Params> {
        ctx.ledger().params()
    }

    pub fn query_validator_outstanding_rewards(&self, ctx: &mut Context<'_>, validator: &ValidatorId) -> Result<DecCoins> {
        Ok(ctx.ledger().outstanding_rewards(validator)?.rewards)
    }

    pub fn query_validator_commission(&self, ctx: &mut Context<'_>, validator: &ValidatorId) -> Result<DecCoins> {
        Ok(ctx.ledger().accumulated_commission(validator)?.commission)
    }

    /// Slash events at heights `start..=end`, oldest first.
    pub fn query_validator_slashes(
        &self,
        ctx: &mut Context<'_>,
        validator: &ValidatorId,
        start: u64,
        end: u64,
    ) -> Result<Vec<(u64, SlashEvent)>> {
        ctx.ledger().validator_slash_events_between(validator, start, end)
    }

    /// Rewards a withdrawal of this delegation would pay at the current height.
    ///
    /// # Errors
    ///
    /// - [`DistributionError::NoValidatorDistInfo`] if the validator does not exist
    /// - [`DistributionError::EmptyDelegationDistInfo`] if the delegation does not exist
    pub fn query_delegation_rewards(
        &self,
        ctx: &mut Context<'_>,
        delegator: &AccountId,
        validator: &ValidatorId,
    ) -> Result<DecCoins> {
        let staking = ctx.staking();
        let info = staking
            .validator(validator)
            .ok_or(DistributionError::NoValidatorDistInfo)?;
        let delegation = staking
            .delegation(delegator, validator)
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;

        ctx.speculative(|overlay| {
            let ending_period = increment_validator_period(overlay, &info)?;
            calculate_delegation_rewards(overlay, &info, &delegation, ending_period)
        })
    }

    pub fn query_delegator_total_rewards(
        &self,
        ctx: &mut Context<'_>,
        delegator: &AccountId,
    ) -> Result<DelegatorTotalRewards> {
        let mut response = DelegatorTotalRewards::default();
        for delegation in ctx.staking().delegator_delegations(delegator) {
            let reward = self.query_delegation_rewards(ctx, delegator, &delegation.validator)?;
            response.total = response.total.add(&reward);
            response.rewards.push(DelegationDelegatorReward {
                validator: delegation.validator,
                reward,
            });
        }
        Ok(response)
    }

    /// Validators the delegator is bonded to.
    pub fn query_delegator_validators(&self, ctx: &mut Context<'_>, delegator: &AccountId) -> Result<Vec<ValidatorId>> {
        Ok(ctx
            .staking()
            .delegator_delegations(delegator)
            .into_iter()
            .map(|d| d.validator)
            .collect())
    }

    pub fn query_withdraw_addr(&self, ctx: &mut Context<'_>, delegator: &AccountId) -> Result<AccountId> {
        ctx.ledger().withdraw_addr(delegator)
    }

    pub fn query_community_pool(&self, ctx: &mut Context<'_>) -> Result<DecCoins> {
        Ok(ctx.ledger().fee_pool()?.community_pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestChain;
    use strata_types::Dec;

    #[test]
    fn test_delegation_rewards_query_is_side_effect_free() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        chain.next_block();
        chain.allocate_to_validator(&v, 10).expect("allocate");

        let before = chain
            .run(|_, ctx| ctx.ledger().current_rewards(&v))
            .expect("read")
            .expect("current");
        let rewards = chain
            .run(|keeper, ctx| keeper.query_delegation_rewards(ctx, &v, &v))
            .expect("query");
        assert_eq!(rewards.amount_of("stake"), Dec::from(10u64));

        let after = chain
            .run(|_, ctx| ctx.ledger().current_rewards(&v))
            .expect("read")
            .expect("current");
        assert_eq!(before, after);
    }

    #[test]
    fn test_delegator_total_rewards() {
        let mut chain = TestChain::new();
        let a = chain.create_validator("vala", Dec::zero(), 100).expect("create a");
        let b = chain.create_validator("valb", Dec::zero(), 100).expect("create b");
        let alice = AccountId::from("alice");
        chain.delegate(&alice, &a, 100).expect("delegate a");
        chain.delegate(&alice, &b, 100).expect("delegate b");
        chain.next_block();
        chain.allocate_to_validator(&a, 10).expect("allocate a");
        chain.allocate_to_validator(&b, 20).expect("allocate b");

        let total = chain
            .query(|keeper, ctx| keeper.query_delegator_total_rewards(ctx, &alice))
            .expect("query");
        assert_eq!(total.rewards.len(), 2);
        assert_eq!(total.total.amount_of("stake"), Dec::from(15u64));

        let validators = chain
            .query(|keeper, ctx| keeper.query_delegator_validators(ctx, &alice))
            .expect("query");
        assert_eq!(validators, vec![a, b]);
    }

    #[test]
    fn test_simple_queries() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::with_prec(5, 1), 100).expect("create");
        chain.allocate_to_validator(&v, 4).expect("allocate");
        chain.slash(&v, Dec::with_prec(1, 1)).expect("slash");

        let height = chain.height;
        chain
            .query(|keeper, ctx| {
                assert_eq!(keeper.query_params(ctx)?, Params::default());
                assert_eq!(
                    keeper.query_validator_outstanding_rewards(ctx, &v)?.amount_of("stake"),
                    Dec::from(4u64)
                );
                assert_eq!(keeper.query_validator_commission(ctx, &v)?.amount_of("stake"), Dec::from(2u64));
                assert_eq!(keeper.query_validator_slashes(ctx, &v, height, height)?.len(), 1);
                assert!(keeper.query_validator_slashes(ctx, &v, height + 1, height)?.is_empty());
                assert_eq!(keeper.query_withdraw_addr(ctx, &v)?, v);
                assert!(keeper.query_community_pool(ctx)?.is_zero());
                Ok(())
            })
            .expect("queries");
    }

    #[test]
    fn test_query_unknown_delegation() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        let result = chain.query(|keeper, ctx| keeper.query_delegation_rewards(ctx, &"nobody".into(), &v));
        assert!(matches!(result, Err(DistributionError::EmptyDelegationDistInfo)));
    }
}
