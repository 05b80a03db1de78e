//! Slash event log.
//!
//! Every slash ends the validator's period and records the fraction against the
//! period it ended, so that reward calculation can shrink a delegator's stake at
//! exactly that point. Events are append-only until the validator is removed.

use strata_types::records::SlashEvent;
use strata_types::{Dec, ValidatorId};

use crate::period::{increment_reference_count, increment_validator_period};
use crate::{Context, DistributionError, Result};

/// Record a slash of `fraction` against the validator at the current height.
pub fn update_validator_slash_fraction(ctx: &mut Context<'_>, validator: &ValidatorId, fraction: Dec) -> Result<()> {
    if fraction.is_negative() || fraction > Dec::one() {
        invariant_violation!("slash fraction {fraction} for {validator} is outside [0, 1]");
    }

    let info = ctx
        .staking()
        .validator(validator)
        .ok_or(DistributionError::NoValidatorDistInfo)?;

    let new_period = increment_validator_period(ctx, &info)?;
    increment_reference_count(ctx, validator, new_period)?;

    let height = ctx.height();
    ctx.ledger().set_validator_slash_event(
        validator,
        height,
        new_period,
        &SlashEvent {
            validator_period: new_period,
            fraction: fraction.clone(),
        },
    )?;

    tracing::info!(validator = %validator, %fraction, height, period = new_period, "recorded slash event");
    Ok(())
}

/// Slash events of `validator` at heights `start..=end`, in height order.
pub fn slash_events_between(
    ctx: &mut Context<'_>,
    validator: &ValidatorId,
    start: u64,
    end: u64,
) -> Result<Vec<(u64, SlashEvent)>> {
    ctx.ledger().validator_slash_events_between(validator, start, end)
}
