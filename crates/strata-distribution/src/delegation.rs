//! Delegator reward calculation and withdrawal.
//!
//! A delegation's reward between two periods is the growth of the validator's
//! cumulative ratio times the delegation's stake. Slashes split the span:
//!
//! ```text
//! start ──(stake)── slash₁ ──(stake·(1-f₁))── slash₂ ──(stake·(1-f₁)(1-f₂))── end
//! ```
//!
//! Every multiplication on this path truncates, so the sum over all delegators
//! can never exceed what the validator was allocated.

use strata_types::records::DelegatorStartingInfo;
use strata_types::{AccountId, Coins, Dec, DecCoins, ValidatorId};

use crate::expected::{DelegationInfo, ValidatorInfo};
use crate::period::{decrement_reference_count, increment_reference_count, increment_validator_period};
use crate::{Context, DistributionError, Keeper, Result};

/// How far tracked stake may exceed live stake before it counts as corruption.
/// Truncation in share/token conversions loses at most one unit per conversion.
const STAKE_TOLERANCE_UNITS: i64 = 3;

/// Anchor a delegation at the validator's most recently ended period.
pub fn initialize_delegation(ctx: &mut Context<'_>, validator: &ValidatorId, delegator: &AccountId) -> Result<()> {
    let Some(current) = ctx.ledger().current_rewards(validator)? else {
        invariant_violation!("no current rewards for validator {validator}");
    };
    let previous_period = current.period - 1;
    increment_reference_count(ctx, validator, previous_period)?;

    let staking = ctx.staking();
    let info = staking
        .validator(validator)
        .ok_or(DistributionError::NoValidatorDistInfo)?;
    let delegation = staking
        .delegation(delegator, validator)
        .ok_or(DistributionError::EmptyDelegationDistInfo)?;

    // Truncated so that the tracked stake never exceeds the live token value.
    let stake = info.tokens_from_shares_truncated(&delegation.shares);
    let height = ctx.height();
    ctx.ledger().set_delegator_starting_info(
        validator,
        delegator,
        &DelegatorStartingInfo {
            previous_period,
            stake,
            height,
        },
    )
}

/// Rewards for `stake` held from the end of `starting_period` to the end of
/// `ending_period`.
pub fn calculate_delegation_rewards_between(
    ctx: &mut Context<'_>,
    validator: &ValidatorId,
    starting_period: u64,
    ending_period: u64,
    stake: &Dec,
) -> Result<DecCoins> {
    if starting_period > ending_period {
        invariant_violation!("starting period {starting_period} cannot be after ending period {ending_period}");
    }
    if stake.is_negative() {
        invariant_violation!("stake {stake} should not be negative");
    }

    let ledger = ctx.ledger();
    let Some(starting) = ledger.historical_rewards(validator, starting_period)? else {
        invariant_violation!("missing historical rewards for {validator} period {starting_period}");
    };
    let Some(ending) = ledger.historical_rewards(validator, ending_period)? else {
        invariant_violation!("missing historical rewards for {validator} period {ending_period}");
    };

    let Some(difference) = ending
        .cumulative_reward_ratio
        .checked_sub(&starting.cumulative_reward_ratio)
    else {
        invariant_violation!("negative reward ratio growth for {validator} between periods {starting_period} and {ending_period}");
    };
    Ok(difference.mul_dec_truncate(stake))
}

/// Rewards owed to `delegation` up to the end of `ending_period`.
///
/// # Errors
///
/// Returns [`DistributionError::EmptyDelegationDistInfo`] if the delegation has no
/// starting info.
pub fn calculate_delegation_rewards(
    ctx: &mut Context<'_>,
    validator: &ValidatorInfo,
    delegation: &DelegationInfo,
    ending_period: u64,
) -> Result<DecCoins> {
    let operator = &validator.operator;
    let starting_info = ctx
        .ledger()
        .delegator_starting_info(operator, &delegation.delegator)?
        .ok_or(DistributionError::EmptyDelegationDistInfo)?;

    // Created in this block: nothing accrued yet.
    if starting_info.height == ctx.height() {
        return Ok(DecCoins::new());
    }

    let mut rewards = DecCoins::new();
    let mut starting_period = starting_info.previous_period;
    let mut stake = starting_info.stake;

    let ending_height = ctx.height();
    if ending_height > starting_info.height {
        let events = ctx
            .ledger()
            .validator_slash_events_between(operator, starting_info.height, ending_height)?;
        for (_, event) in events {
            let ending = event.validator_period;
            if ending > starting_period {
                let segment = calculate_delegation_rewards_between(ctx, operator, starting_period, ending, &stake)?;
                rewards = rewards.add(&segment);
                stake = stake.mul_truncate(&(Dec::one() - event.fraction));
                starting_period = ending;
            }
        }
    }

    let current_stake = validator.tokens_from_shares(&delegation.shares);
    if stake > current_stake {
        let margin = Dec::with_prec(STAKE_TOLERANCE_UNITS, strata_types::decimal::PRECISION);
        if stake <= &current_stake + &margin {
            tracing::debug!(
                validator = %operator,
                delegator = %delegation.delegator,
                %stake,
                %current_stake,
                "clamping tracked stake to live stake"
            );
            stake = current_stake;
        } else {
            invariant_violation!(
                "calculated final stake for delegator {} greater than current stake: final {stake}, current {current_stake}",
                delegation.delegator
            );
        }
    }

    let last = calculate_delegation_rewards_between(ctx, operator, starting_period, ending_period, &stake)?;
    Ok(rewards.add(&last))
}

impl Keeper {
    /// Pay out a delegation's accrued rewards and release its starting info.
    ///
    /// Does not re-anchor the delegation: callers either re-initialize it or
    /// are about to change its shares, after which the staking module's
    /// "delegation modified" hook re-anchors it.
    pub(crate) fn settle_delegation_rewards(
        &self,
        ctx: &mut Context<'_>,
        validator: &ValidatorInfo,
        delegation: &DelegationInfo,
    ) -> Result<Coins> {
        let operator = &validator.operator;
        let delegator = &delegation.delegator;
        let Some(starting_info) = ctx.ledger().delegator_starting_info(operator, delegator)? else {
            return Err(DistributionError::EmptyDelegationDistInfo);
        };

        let ending_period = increment_validator_period(ctx, validator)?;
        let raw = calculate_delegation_rewards(ctx, validator, delegation, ending_period)?;

        let mut outstanding = ctx.ledger().outstanding_rewards(operator)?;
        let rewards = raw.intersect(&outstanding.rewards);
        if rewards != raw {
            tracing::info!(
                validator = %operator,
                delegator = %delegator,
                calculated = %raw,
                paid = %rewards,
                "rounding error withdrawing rewards from validator"
            );
        }

        let (coins, remainder) = rewards.truncate_decimal()?;
        if !coins.is_zero() {
            let withdraw_addr = ctx.ledger().withdraw_addr(delegator)?;
            ctx.bank().send(self.module_account(), &withdraw_addr, &coins)?;
        }

        outstanding.rewards = match outstanding.rewards.checked_sub(&rewards) {
            Some(left) => left,
            None => invariant_violation!("outstanding rewards of {operator} would go negative"),
        };
        let mut ledger = ctx.ledger();
        ledger.set_outstanding_rewards(operator, &outstanding)?;
        let mut pool = ledger.fee_pool()?;
        pool.community_pool = pool.community_pool.add(&remainder);
        ledger.set_fee_pool(&pool)?;
        drop(ledger);

        decrement_reference_count(ctx, operator, starting_info.previous_period)?;
        ctx.ledger().delete_delegator_starting_info(operator, delegator)?;

        tracing::debug!(validator = %operator, delegator = %delegator, amount = %coins, "withdrew delegation rewards");
        Ok(coins)
    }
}
