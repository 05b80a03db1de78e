//! Ledger consistency checks.
//!
//! Each check returns an [`InvariantReport`] instead of aborting, so callers
//! (the simulator, integration tests, an operator tool) decide what a broken
//! invariant means for them.

use serde::{Deserialize, Serialize};
use strata_types::DecCoins;

use crate::{Context, DistributionError, Keeper, Result, MODULE_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    /// `module/name`, e.g. `distribution/reference-count`.
    pub route: String,
    pub message: String,
    pub broken: bool,
}

impl InvariantReport {
    fn new(name: &str, message: String, broken: bool) -> Self {
        Self {
            route: format!("{MODULE_NAME}/{name}"),
            message,
            broken,
        }
    }
}

/// No validator's outstanding rewards are negative.
pub fn nonnegative_outstanding(ctx: &mut Context<'_>) -> Result<InvariantReport> {
    let mut message = String::new();
    let mut count = 0;
    for (validator, outstanding) in ctx.ledger().all_outstanding_rewards()? {
        if outstanding.rewards.is_any_negative() {
            count += 1;
            message.push_str(&format!("\t{validator} has negative outstanding coins: {}\n", outstanding.rewards));
        }
    }
    Ok(InvariantReport::new(
        "nonnegative-outstanding",
        format!("found {count} validators with negative outstanding rewards\n{message}"),
        count != 0,
    ))
}

/// Withdrawing every commission and every delegation's rewards leaves no
/// validator with negative outstanding rewards. Runs in a discarded overlay.
pub fn can_withdraw(keeper: &Keeper, ctx: &mut Context<'_>) -> Result<InvariantReport> {
    ctx.speculative(|overlay| {
        let staking = overlay.staking();
        for validator in staking.validators() {
            match keeper.withdraw_validator_commission(overlay, &validator.operator) {
                Ok(_) | Err(DistributionError::NoValidatorCommission) => {}
                Err(e) => return Err(e),
            }
            for delegation in staking.validator_delegations(&validator.operator) {
                keeper.settle_delegation_rewards(overlay, &validator, &delegation)?;
            }
        }

        let mut remaining = DecCoins::new();
        let mut broken = false;
        for (_, outstanding) in overlay.ledger().all_outstanding_rewards()? {
            if outstanding.rewards.is_any_negative() {
                broken = true;
            }
            remaining = remaining.add(&outstanding.rewards);
        }
        Ok(InvariantReport::new(
            "can-withdraw",
            format!("remaining coins after withdrawing everything: {remaining}"),
            broken,
        ))
    })
}

/// Historical reference counts equal one per validator, one per delegation and
/// one per slash event.
pub fn reference_count(ctx: &mut Context<'_>) -> Result<InvariantReport> {
    let staking = ctx.staking();
    let validators = staking.validators().len() as u64;
    let delegations = staking.delegations().len() as u64;
    let ledger = ctx.ledger();
    let slashes = ledger.all_slash_events()?.len() as u64;
    let expected = validators + delegations + slashes;
    let actual = ledger.historical_reference_count()?;

    Ok(InvariantReport::new(
        "reference-count",
        format!(
            "expected historical reference count: {validators} + {delegations} + {slashes} = {expected}\ntotal historical reference count: {actual}"
        ),
        expected != actual,
    ))
}

/// The module account holds exactly the integer part of everything owed:
/// outstanding rewards plus the community pool.
pub fn module_account(keeper: &Keeper, ctx: &mut Context<'_>) -> Result<InvariantReport> {
    let ledger = ctx.ledger();
    let owed = ledger
        .all_outstanding_rewards()?
        .iter()
        .fold(ledger.fee_pool()?.community_pool, |acc, (_, o)| acc.add(&o.rewards));
    let (expected, _) = owed.truncate_decimal()?;
    let balance = ctx.bank().balance(keeper.module_account());

    Ok(InvariantReport::new(
        "module-account",
        format!("expected module account coins: {expected}\ndistribution module account coins: {balance}"),
        expected != balance,
    ))
}

/// Every check, in registration order.
pub fn all_invariants(keeper: &Keeper, ctx: &mut Context<'_>) -> Result<Vec<InvariantReport>> {
    let reports = vec![
        nonnegative_outstanding(ctx)?,
        can_withdraw(keeper, ctx)?,
        reference_count(ctx)?,
        module_account(keeper, ctx)?,
    ];
    for report in reports.iter().filter(|r| r.broken) {
        tracing::warn!(route = %report.route, "invariant broken: {}", report.message);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expected::BankKeeper;
    use crate::testing::TestChain;
    use strata_types::{AccountId, Coins, Dec};

    fn assert_all_hold(chain: &mut TestChain) {
        let reports = chain
            .query(|keeper, ctx| all_invariants(keeper, ctx))
            .expect("invariants");
        for report in reports {
            assert!(!report.broken, "{}: {}", report.route, report.message);
        }
    }

    #[test]
    fn test_invariants_hold_through_lifecycle() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::with_prec(1, 1), 100).expect("create");
        let alice = AccountId::from("alice");
        chain.delegate(&alice, &v, 50).expect("delegate");
        assert_all_hold(&mut chain);

        let votes = chain.last_commit();
        chain.begin_block(&v, &Coins::new(), &votes).expect("block");
        chain.begin_block(&v, &Coins::single("stake", 1_000), &votes).expect("block");
        assert_all_hold(&mut chain);

        chain.slash(&v, Dec::with_prec(1, 2)).expect("slash");
        chain.next_block();
        chain.begin_block(&v, &Coins::single("stake", 333), &votes).expect("block");
        assert_all_hold(&mut chain);

        chain.undelegate(&alice, &v, Dec::from(50u64)).expect("undelegate");
        assert_all_hold(&mut chain);
    }

    #[test]
    fn test_module_account_detects_missing_funds() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        chain.allocate_to_validator(&v, 10).expect("allocate");
        // Drain the module account behind distribution's back.
        let module = chain.keeper.module_account().clone();
        chain
            .bank
            .send(&module, &AccountId::from("thief"), &Coins::single("stake", 3))
            .expect("drain");

        let report = chain
            .query(|keeper, ctx| module_account(keeper, ctx))
            .expect("check");
        assert!(report.broken);
        assert_eq!(report.route, "distribution/module-account");
    }

    #[test]
    fn test_reference_count_detects_leak() {
        let mut chain = TestChain::new();
        let v = chain.create_validator("val", Dec::zero(), 100).expect("create");
        chain
            .run(|_, ctx| crate::period::decrement_reference_count(ctx, &v, 1))
            .expect("leak");
        let report = chain.query(|_, ctx| reference_count(ctx)).expect("check");
        assert!(report.broken);
    }
}
