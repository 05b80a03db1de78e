//! Validator reward periods.
//!
//! Ending period `p` snapshots the rewards accrued while it was open into a
//! cumulative per-token ratio:
//!
//! ```text
//! ratio(p) = ratio(p - 1) + current.rewards / tokens     (truncating)
//! ```
//!
//! Each historical record is reference counted. Period `p`'s record holds one
//! reference for period `p + 1` (which will diff against it) plus one for the
//! delegation or slash event anchored at it, if any.

use strata_types::records::{AccumulatedCommission, CurrentRewards, HistoricalRewards, OutstandingRewards};
use strata_types::{Dec, DecCoins, ValidatorId};

use crate::expected::ValidatorInfo;
use crate::{Context, Result};

/// Create the period-0 snapshot and empty running records for a new validator.
pub fn initialize_validator(ctx: &mut Context<'_>, validator: &ValidatorId) -> Result<()> {
    let mut ledger = ctx.ledger();
    ledger.set_historical_rewards(
        validator,
        0,
        &HistoricalRewards {
            cumulative_reward_ratio: DecCoins::new(),
            reference_count: 1,
        },
    )?;
    ledger.set_current_rewards(
        validator,
        &CurrentRewards {
            rewards: DecCoins::new(),
            period: 1,
        },
    )?;
    ledger.set_accumulated_commission(validator, &AccumulatedCommission::default())?;
    ledger.set_outstanding_rewards(validator, &OutstandingRewards::default())?;
    tracing::debug!(validator = %validator, "initialized validator distribution records");
    Ok(())
}

/// End the validator's open period and return its number.
///
/// With zero bonded tokens the open period's rewards cannot become a ratio;
/// they move from outstanding to the community pool instead.
pub fn increment_validator_period(ctx: &mut Context<'_>, validator: &ValidatorInfo) -> Result<u64> {
    let operator = &validator.operator;
    let mut ledger = ctx.ledger();
    let Some(rewards) = ledger.current_rewards(operator)? else {
        invariant_violation!("no current rewards for validator {operator}");
    };

    let current = if validator.tokens == 0 {
        let mut pool = ledger.fee_pool()?;
        let mut outstanding = ledger.outstanding_rewards(operator)?;
        pool.community_pool = pool.community_pool.add(&rewards.rewards);
        outstanding.rewards = match outstanding.rewards.checked_sub(&rewards.rewards) {
            Some(left) => left,
            None => invariant_violation!("outstanding rewards of {operator} would go negative"),
        };
        ledger.set_fee_pool(&pool)?;
        ledger.set_outstanding_rewards(operator, &outstanding)?;
        DecCoins::new()
    } else {
        match rewards.rewards.quo_dec_truncate(&Dec::from(validator.tokens)) {
            Some(ratio) => ratio,
            None => invariant_violation!("division by zero tokens for validator {operator}"),
        }
    };

    let previous = rewards.period - 1;
    let Some(historical) = ledger.historical_rewards(operator, previous)? else {
        invariant_violation!("missing historical rewards for {operator} period {previous}");
    };
    drop(ledger);
    decrement_reference_count(ctx, operator, previous)?;

    let mut ledger = ctx.ledger();
    ledger.set_historical_rewards(
        operator,
        rewards.period,
        &HistoricalRewards {
            cumulative_reward_ratio: historical.cumulative_reward_ratio.add(&current),
            reference_count: 1,
        },
    )?;
    ledger.set_current_rewards(
        operator,
        &CurrentRewards {
            rewards: DecCoins::new(),
            period: rewards.period + 1,
        },
    )?;

    tracing::debug!(validator = %operator, period = rewards.period, "ended validator period");
    Ok(rewards.period)
}

/// Anchor one more delegation or slash event at `period`.
pub fn increment_reference_count(ctx: &mut Context<'_>, validator: &ValidatorId, period: u64) -> Result<()> {
    let mut ledger = ctx.ledger();
    let Some(mut historical) = ledger.historical_rewards(validator, period)? else {
        invariant_violation!("missing historical rewards for {validator} period {period}");
    };
    if historical.reference_count >= 2 {
        invariant_violation!("reference count for {validator} period {period} should never exceed 2");
    }
    historical.reference_count += 1;
    ledger.set_historical_rewards(validator, period, &historical)
}

/// Release one anchor at `period`, deleting the record when none remain.
pub fn decrement_reference_count(ctx: &mut Context<'_>, validator: &ValidatorId, period: u64) -> Result<()> {
    let mut ledger = ctx.ledger();
    let Some(mut historical) = ledger.historical_rewards(validator, period)? else {
        invariant_violation!("missing historical rewards for {validator} period {period}");
    };
    if historical.reference_count == 0 {
        invariant_violation!("cannot decrement zero reference count for {validator} period {period}");
    }
    historical.reference_count -= 1;
    if historical.reference_count == 0 {
        ledger.delete_historical_rewards(validator, period)
    } else {
        ledger.set_historical_rewards(validator, period, &historical)
    }
}
