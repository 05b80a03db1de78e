//! Per-block fee allocation.
//!
//! The fees collected during the previous block are split as follows:
//!
//! ```text
//! proposer_multiplier = base + bonus × (signed_power / total_power)     (≤ 1)
//! proposer            = fees × proposer_multiplier
//! vote_multiplier     = 1 − proposer_multiplier − community_tax
//! each voter          = fees × vote_multiplier × (power / total_power)
//! community pool      = whatever remains
//! ```
//!
//! Every multiplication truncates; the community pool absorbs the dust.

use strata_types::{ConsAddress, Dec, DecCoins, VoteInfo};

use crate::events::{self, Event};
use crate::expected::ValidatorInfo;
use crate::{Context, Keeper, Result};

impl Keeper {
    /// Block entry point: allocate the previous block's fees, then remember the
    /// current proposer for the next block.
    pub fn begin_block(&self, ctx: &mut Context<'_>, proposer: &ConsAddress, last_commit: &[VoteInfo]) -> Result<()> {
        // Widened so that a commit of near-maximal powers cannot overflow.
        let total_power: i128 = last_commit.iter().map(|v| i128::from(v.power)).sum();
        let signed_power: i128 = last_commit
            .iter()
            .filter(|v| v.signed_last_block)
            .map(|v| i128::from(v.power))
            .sum();

        // Nothing was committed before the first block.
        if ctx.height() > 1 {
            if let Some(previous_proposer) = ctx.ledger().previous_proposer()? {
                self.allocate_tokens(ctx, signed_power, total_power, &previous_proposer, last_commit)?;
            }
        }

        ctx.ledger().set_previous_proposer(proposer)
    }

    /// Move the fee collector's balance into the module account and split it
    /// between the proposer, the voters and the community pool.
    pub fn allocate_tokens(
        &self,
        ctx: &mut Context<'_>,
        signed_power: i128,
        total_power: i128,
        proposer: &ConsAddress,
        votes: &[VoteInfo],
    ) -> Result<()> {
        let collected = ctx.bank().balance(self.fee_collector());
        if !collected.is_zero() {
            ctx.bank().send(self.fee_collector(), self.module_account(), &collected)?;
        }
        let fees = DecCoins::from(&collected);

        let params = ctx.ledger().params()?;
        let mut pool = ctx.ledger().fee_pool()?;

        // No power means no one to reward, e.g. when every validator unbonded.
        if total_power <= 0 {
            pool.community_pool = pool.community_pool.add(&fees);
            return ctx.ledger().set_fee_pool(&pool);
        }

        let total = Dec::from(total_power);
        let fraction_votes = Dec::from(signed_power).quo_truncate(&total).unwrap_or_default();
        let proposer_multiplier =
            (&params.base_proposer_reward + &params.bonus_proposer_reward.mul_truncate(&fraction_votes)).min(Dec::one());
        let proposer_reward = fees.mul_dec_truncate(&proposer_multiplier);

        let mut remaining = fees.clone();
        match ctx.staking().validator_by_cons_addr(proposer) {
            Some(validator) => {
                ctx.emit(
                    Event::new(events::EVENT_TYPE_PROPOSER_REWARD)
                        .attr(events::ATTRIBUTE_KEY_AMOUNT, &proposer_reward)
                        .attr(events::ATTRIBUTE_KEY_VALIDATOR, &validator.operator),
                );
                self.allocate_tokens_to_validator(ctx, &validator, &proposer_reward)?;
                remaining = subtract_allocated(&remaining, &proposer_reward);
            }
            None => {
                // Possible only if the proposer unbonded completely within a
                // single block; its share stays with the community pool.
                tracing::warn!(
                    proposer = %proposer,
                    "attempt to allocate proposer rewards to unknown proposer"
                );
            }
        }

        let vote_multiplier = {
            let m = &(Dec::one() - proposer_multiplier) - &params.community_tax;
            if m.is_negative() {
                Dec::zero()
            } else {
                m
            }
        };
        let voter_share = fees.mul_dec_truncate(&vote_multiplier);

        for vote in votes {
            let Some(validator) = ctx.staking().validator_by_cons_addr(&vote.address) else {
                tracing::warn!(voter = %vote.address, "skipping rewards for unknown voter");
                continue;
            };
            let power_fraction = Dec::from(vote.power).quo_truncate(&total).unwrap_or_default();
            let reward = voter_share.mul_dec_truncate(&power_fraction);
            self.allocate_tokens_to_validator(ctx, &validator, &reward)?;
            remaining = subtract_allocated(&remaining, &reward);
        }

        let mut pool = ctx.ledger().fee_pool()?;
        pool.community_pool = pool.community_pool.add(&remaining);
        ctx.ledger().set_fee_pool(&pool)
    }

    /// Credit `tokens` to a validator: the commission share to its accumulated
    /// commission, the rest to the running reward of its open period.
    pub fn allocate_tokens_to_validator(
        &self,
        ctx: &mut Context<'_>,
        validator: &ValidatorInfo,
        tokens: &DecCoins,
    ) -> Result<()> {
        let operator = &validator.operator;
        let commission = tokens.mul_dec(&validator.commission_rate);
        let Some(shared) = tokens.checked_sub(&commission) else {
            invariant_violation!("commission {commission} exceeds allocation {tokens} for {operator}");
        };

        let mut ledger = ctx.ledger();
        let mut accumulated = ledger.accumulated_commission(operator)?;
        accumulated.commission = accumulated.commission.add(&commission);
        ledger.set_accumulated_commission(operator, &accumulated)?;

        let Some(mut current) = ledger.current_rewards(operator)? else {
            invariant_violation!("no current rewards for validator {operator}");
        };
        current.rewards = current.rewards.add(&shared);
        ledger.set_current_rewards(operator, &current)?;

        let mut outstanding = ledger.outstanding_rewards(operator)?;
        outstanding.rewards = outstanding.rewards.add(tokens);
        ledger.set_outstanding_rewards(operator, &outstanding)?;

        ctx.emit(
            Event::new(events::EVENT_TYPE_COMMISSION)
                .attr(events::ATTRIBUTE_KEY_AMOUNT, &commission)
                .attr(events::ATTRIBUTE_KEY_VALIDATOR, operator),
        );
        ctx.emit(
            Event::new(events::EVENT_TYPE_REWARDS)
                .attr(events::ATTRIBUTE_KEY_AMOUNT, tokens)
                .attr(events::ATTRIBUTE_KEY_VALIDATOR, operator),
        );
        Ok(())
    }
}

fn subtract_allocated(remaining: &DecCoins, allocated: &DecCoins) -> DecCoins {
    match remaining.checked_sub(allocated) {
        Some(left) => left,
        None => invariant_violation!("allocated {allocated} exceeds remaining fees {remaining}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestChain;
    use strata_types::Coins;

    fn dec(s: &str) -> Dec {
        s.parse().expect("dec")
    }

    #[test]
    fn test_allocate_tokens_to_validator_with_commission() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::with_prec(5, 1), 100).expect("create");
        chain.allocate_to_validator(&v, 10).expect("allocate");

        let (commission, current, outstanding) = chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                Ok((
                    ledger.accumulated_commission(&v)?,
                    ledger.current_rewards(&v)?.expect("current"),
                    ledger.outstanding_rewards(&v)?,
                ))
            })
            .expect("read");
        assert_eq!(commission.commission.amount_of("stake"), dec("5"));
        assert_eq!(current.rewards.amount_of("stake"), dec("5"));
        assert_eq!(outstanding.rewards.amount_of("stake"), dec("10"));
    }

    #[test]
    fn test_allocate_tokens_to_many_validators() {
        let mut chain = TestChain::new();
        let a = chain.create_validator("vala", Dec::with_prec(5, 1), 100).expect("create a");
        let b = chain.create_validator("valb", Dec::with_prec(1, 1), 100).expect("create b");
        let a_addr = chain.cons_address(&a);
        let b_addr = chain.cons_address(&b);

        chain.collect_fees(&Coins::single("stake", 100));
        let votes = [
            VoteInfo {
                address: a_addr,
                power: 100,
                signed_last_block: true,
            },
            VoteInfo {
                address: b_addr,
                power: 100,
                signed_last_block: true,
            },
        ];
        chain
            .run(|keeper, ctx| keeper.allocate_tokens(ctx, 200, 200, &a_addr, &votes))
            .expect("allocate");

        let (oa, ob, ca, cb, cur_a, cur_b, pool) = chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                Ok((
                    ledger.outstanding_rewards(&a)?.rewards,
                    ledger.outstanding_rewards(&b)?.rewards,
                    ledger.accumulated_commission(&a)?.commission,
                    ledger.accumulated_commission(&b)?.commission,
                    ledger.current_rewards(&a)?.expect("a").rewards,
                    ledger.current_rewards(&b)?.expect("b").rewards,
                    ledger.fee_pool()?.community_pool,
                ))
            })
            .expect("read");

        // Proposer: 100 × (0.01 + 0.04) = 5, plus 100 × 0.93 × 0.5 = 46.5.
        assert_eq!(oa.amount_of("stake"), dec("51.5"));
        assert_eq!(ob.amount_of("stake"), dec("46.5"));
        assert_eq!(pool.amount_of("stake"), dec("2"));
        assert_eq!(ca.amount_of("stake"), dec("25.75"));
        assert_eq!(cur_a.amount_of("stake"), dec("25.75"));
        assert_eq!(cb.amount_of("stake"), dec("4.65"));
        assert_eq!(cur_b.amount_of("stake"), dec("41.85"));

        // The fee collector was drained into the module account.
        assert!(chain.bank.balance_of(chain.keeper.fee_collector()).is_zero());
        assert_eq!(chain.bank.balance_of(chain.keeper.module_account()), Coins::single("stake", 100));
    }

    #[test]
    fn test_allocate_tokens_truncation_goes_to_pool() {
        let mut chain = TestChain::new();
        let mut votes = Vec::new();
        let mut validators = Vec::new();
        for name in ["vala", "valb", "valc"] {
            let v = chain.create_validator(name, Dec::with_prec(1, 1), 100).expect("create");
            votes.push(VoteInfo {
                address: chain.cons_address(&v),
                power: 11,
                signed_last_block: true,
            });
            validators.push(v);
        }

        chain.collect_fees(&Coins::single("stake", 634_195_840));
        let proposer = votes[1].address;
        chain
            .run(|keeper, ctx| keeper.allocate_tokens(ctx, 33, 33, &proposer, &votes))
            .expect("allocate");

        let (total, pool) = chain
            .run(|keeper, ctx| Ok((keeper.total_rewards(ctx)?, ctx.ledger().fee_pool()?.community_pool)))
            .expect("read");
        assert!(!pool.is_zero());
        // Nothing created or lost: every unit is either allocated or pooled.
        assert_eq!(total.add(&pool).amount_of("stake"), dec("634195840"));
    }

    #[test]
    fn test_zero_total_power_funds_community_pool() {
        let mut chain = TestChain::new();
        chain.collect_fees(&Coins::single("stake", 50));
        let proposer = ConsAddress::new([9; 20]);
        chain
            .run(|keeper, ctx| keeper.allocate_tokens(ctx, 0, 0, &proposer, &[]))
            .expect("allocate");
        let pool = chain.run(|_, ctx| ctx.ledger().fee_pool()).expect("pool");
        assert_eq!(pool.community_pool.amount_of("stake"), dec("50"));
    }

    #[test]
    fn test_unknown_proposer_share_stays_in_pool() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        let votes = [VoteInfo {
            address: chain.cons_address(&v),
            power: 100,
            signed_last_block: true,
        }];
        chain.collect_fees(&Coins::single("stake", 100));
        let unknown = ConsAddress::new([7; 20]);
        chain
            .run(|keeper, ctx| keeper.allocate_tokens(ctx, 100, 100, &unknown, &votes))
            .expect("allocate");

        let (outstanding, pool) = chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                Ok((ledger.outstanding_rewards(&v)?.rewards, ledger.fee_pool()?.community_pool))
            })
            .expect("read");
        assert_eq!(outstanding.amount_of("stake"), dec("93"));
        assert_eq!(pool.amount_of("stake"), dec("7"));
    }

    #[test]
    fn test_begin_block_uses_previous_proposer() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        let addr = chain.cons_address(&v);
        let votes = vec![VoteInfo {
            address: addr,
            power: 100,
            signed_last_block: true,
        }];

        // Height 1: only records the proposer.
        chain.collect_fees(&Coins::single("stake", 100));
        chain.run(|keeper, ctx| keeper.begin_block(ctx, &addr, &[])).expect("block 1");
        let outstanding = chain.run(|_, ctx| ctx.ledger().outstanding_rewards(&v)).expect("read");
        assert!(outstanding.rewards.is_zero());

        chain.next_block();
        chain.run(|keeper, ctx| keeper.begin_block(ctx, &addr, &votes)).expect("block 2");
        let (outstanding, pool) = chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                Ok((ledger.outstanding_rewards(&v)?.rewards, ledger.fee_pool()?.community_pool))
            })
            .expect("read");
        assert_eq!(outstanding.amount_of("stake"), dec("98"));
        assert_eq!(pool.amount_of("stake"), dec("2"));
    }

    #[test]
    fn test_begin_block_with_maximal_powers() {
        let mut chain = TestChain::new();
        let a = chain.create_validator("vala", Dec::zero(), 100).expect("create a");
        let b = chain.create_validator("valb", Dec::zero(), 100).expect("create b");
        let votes: Vec<VoteInfo> = [&a, &b]
            .iter()
            .map(|v| VoteInfo {
                address: chain.cons_address(v),
                power: i64::MAX,
                signed_last_block: true,
            })
            .collect();

        chain.begin_block(&a, &Coins::new(), &votes).expect("block 1");
        chain.begin_block(&a, &Coins::single("stake", 100), &votes).expect("block 2");

        let (oa, ob) = chain
            .run(|_, ctx| {
                let ledger = ctx.ledger();
                Ok((ledger.outstanding_rewards(&a)?.rewards, ledger.outstanding_rewards(&b)?.rewards))
            })
            .expect("read");
        assert_eq!(oa.amount_of("stake"), dec("51.5"));
        assert_eq!(ob.amount_of("stake"), dec("46.5"));
    }
}
