//! Randomized chain driver.
//!
//! Every block collects random fees, allocates them through the keeper's block
//! entry point and then applies a few random staking or distribution
//! operations. Recoverable rejections are counted, not fatal; a broken invariant
//! stops the run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use strata_distribution::invariants::all_invariants;
use strata_distribution::testing::TestChain;
use strata_distribution::{Msg, StakingKeeper};
use strata_types::{AccountId, Coins, Dec, DecCoins, ValidatorId, VoteInfo, BOND_DENOM};

use crate::config::SimulationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Delegate,
    Undelegate,
    WithdrawRewards,
    WithdrawCommission,
    SetWithdrawAddress,
    FundCommunityPool,
    Slash,
    CreateValidator,
    RemoveValidator,
}

impl Operation {
    /// Relative weights used when drawing an operation.
    const WEIGHTED: [(Operation, u32); 9] = [
        (Operation::Delegate, 30),
        (Operation::Undelegate, 15),
        (Operation::WithdrawRewards, 25),
        (Operation::WithdrawCommission, 10),
        (Operation::SetWithdrawAddress, 5),
        (Operation::FundCommunityPool, 5),
        (Operation::Slash, 4),
        (Operation::CreateValidator, 3),
        (Operation::RemoveValidator, 3),
    ];

    fn draw(rng: &mut StdRng) -> Operation {
        let total: u32 = Self::WEIGHTED.iter().map(|(_, w)| w).sum();
        let mut pick = rng.gen_range(0..total);
        for (op, weight) in Self::WEIGHTED {
            if pick < weight {
                return op;
            }
            pick -= weight;
        }
        Operation::Delegate
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    pub blocks: u64,
    pub delegations: u64,
    pub undelegations: u64,
    pub reward_withdrawals: u64,
    pub commission_withdrawals: u64,
    pub withdraw_address_changes: u64,
    pub community_pool_deposits: u64,
    pub slashes: u64,
    pub validators_created: u64,
    pub validators_removed: u64,
    pub rejected: u64,
    pub invariant_checks: u64,
}

/// Final state reported after a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimSummary {
    pub seed: u64,
    pub height: u64,
    pub stats: SimStats,
    pub validators: usize,
    pub delegations: usize,
    pub outstanding_rewards: String,
    pub community_pool: String,
    pub module_balance: String,
}

pub struct Simulation {
    chain: TestChain,
    rng: StdRng,
    config: SimulationConfig,
    delegators: Vec<AccountId>,
    next_validator: u32,
    stats: SimStats,
}

impl Simulation {
    pub fn new(chain: TestChain, config: SimulationConfig) -> Self {
        let delegators = (0..config.delegators)
            .map(|i| AccountId::new(format!("delegator{i}")))
            .collect();
        Self {
            chain,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            delegators,
            next_validator: 0,
            stats: SimStats::default(),
        }
    }

    /// Create the genesis validator set.
    pub fn genesis(&mut self) -> anyhow::Result<()> {
        for _ in 0..self.config.validators.max(1) {
            self.create_validator()?;
        }
        tracing::info!(validators = self.config.validators, "genesis complete");
        Ok(())
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        for _ in 0..self.config.blocks {
            self.step()?;
            let period = self.config.invariant_period;
            if period > 0 && self.stats.blocks % period == 0 {
                self.check_invariants()?;
            }
        }
        self.check_invariants()
    }

    fn step(&mut self) -> anyhow::Result<()> {
        let votes: Vec<VoteInfo> = self
            .chain
            .last_commit()
            .into_iter()
            .map(|mut vote| {
                vote.signed_last_block = self.rng.gen_bool(0.9);
                vote
            })
            .collect();
        let fees = Coins::single(BOND_DENOM, self.rng.gen_range(0..=self.config.max_fee));
        match self.pick_validator() {
            Some(proposer) => self.chain.begin_block(&proposer, &fees, &votes)?,
            None => self.chain.next_block(),
        }
        self.stats.blocks += 1;

        let ops = self.rng.gen_range(0..=self.config.ops_per_block);
        for _ in 0..ops {
            let op = Operation::draw(&mut self.rng);
            if let Err(e) = self.apply(op) {
                self.stats.rejected += 1;
                tracing::debug!(?op, error = %e, "operation rejected");
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: Operation) -> anyhow::Result<()> {
        match op {
            Operation::Delegate => {
                let Some(validator) = self.pick_validator() else {
                    return Ok(());
                };
                let delegator = self.pick_delegator();
                let amount = self.rng.gen_range(1..=1_000);
                self.chain.delegate(&delegator, &validator, amount)?;
                self.stats.delegations += 1;
            }
            Operation::Undelegate => {
                let Some(delegation) = self.pick_delegation() else {
                    return Ok(());
                };
                // Half the time unbond everything.
                let shares = if self.rng.gen_bool(0.5) {
                    delegation.shares
                } else {
                    delegation.shares.mul_truncate(&Dec::with_prec(self.rng.gen_range(1..=99), 2))
                };
                if !shares.is_positive() {
                    return Ok(());
                }
                self.chain
                    .undelegate(&delegation.delegator, &delegation.validator, shares)?;
                self.stats.undelegations += 1;
            }
            Operation::WithdrawRewards => {
                let Some(delegation) = self.pick_delegation() else {
                    return Ok(());
                };
                self.handle(Msg::WithdrawDelegatorReward {
                    delegator: delegation.delegator,
                    validator: delegation.validator,
                })?;
                self.stats.reward_withdrawals += 1;
            }
            Operation::WithdrawCommission => {
                let Some(validator) = self.pick_validator() else {
                    return Ok(());
                };
                self.handle(Msg::WithdrawValidatorCommission { validator })?;
                self.stats.commission_withdrawals += 1;
            }
            Operation::SetWithdrawAddress => {
                let delegator = self.pick_delegator();
                let withdraw_address = AccountId::new(format!("{delegator}-cold"));
                self.handle(Msg::SetWithdrawAddress {
                    delegator,
                    withdraw_address,
                })?;
                self.stats.withdraw_address_changes += 1;
            }
            Operation::FundCommunityPool => {
                let depositor = self.pick_delegator();
                let amount = Coins::single(BOND_DENOM, self.rng.gen_range(1..=100));
                self.chain.bank.mint(&depositor, &amount);
                self.handle(Msg::FundCommunityPool { amount, depositor })?;
                self.stats.community_pool_deposits += 1;
            }
            Operation::Slash => {
                let Some(validator) = self.pick_validator() else {
                    return Ok(());
                };
                let fraction = Dec::with_prec(self.rng.gen_range(0..=10), 2);
                self.chain.slash(&validator, fraction)?;
                self.stats.slashes += 1;
            }
            Operation::CreateValidator => self.create_validator()?,
            Operation::RemoveValidator => {
                if self.chain.staking.validators().len() <= 1 {
                    return Ok(());
                }
                let Some(validator) = self.pick_validator() else {
                    return Ok(());
                };
                for delegation in self.chain.staking.validator_delegations(&validator) {
                    self.chain
                        .undelegate(&delegation.delegator, &validator, delegation.shares)?;
                }
                self.chain.remove_validator(&validator)?;
                self.stats.validators_removed += 1;
                tracing::info!(validator = %validator, height = self.chain.height, "validator removed");
            }
        }
        Ok(())
    }

    fn handle(&mut self, msg: Msg) -> anyhow::Result<()> {
        self.chain.run(|keeper, ctx| keeper.handle(ctx, &msg))?;
        Ok(())
    }

    fn create_validator(&mut self) -> anyhow::Result<()> {
        let name = format!("validator{}", self.next_validator);
        self.next_validator += 1;
        let commission = Dec::with_prec(self.rng.gen_range(0..=20), 2);
        let self_bond = self.rng.gen_range(100..=10_000);
        self.chain.create_validator(&name, commission, self_bond)?;
        self.stats.validators_created += 1;
        Ok(())
    }

    fn check_invariants(&mut self) -> anyhow::Result<()> {
        let reports = self.chain.query(|keeper, ctx| all_invariants(keeper, ctx))?;
        self.stats.invariant_checks += 1;
        if let Some(broken) = reports.iter().find(|r| r.broken) {
            anyhow::bail!(
                "invariant {} broken at height {}: {}",
                broken.route,
                self.chain.height,
                broken.message
            );
        }
        tracing::debug!(height = self.chain.height, "all invariants hold");
        Ok(())
    }

    fn pick_validator(&mut self) -> Option<ValidatorId> {
        let validators = self.chain.staking.validators();
        if validators.is_empty() {
            return None;
        }
        let i = self.rng.gen_range(0..validators.len());
        Some(validators[i].operator.clone())
    }

    fn pick_delegator(&mut self) -> AccountId {
        if self.delegators.is_empty() {
            return AccountId::from("delegator");
        }
        let i = self.rng.gen_range(0..self.delegators.len());
        self.delegators[i].clone()
    }

    fn pick_delegation(&mut self) -> Option<strata_distribution::DelegationInfo> {
        let delegations = self.chain.staking.delegations();
        if delegations.is_empty() {
            return None;
        }
        let i = self.rng.gen_range(0..delegations.len());
        Some(delegations[i].clone())
    }

    pub fn summary(&mut self) -> anyhow::Result<SimSummary> {
        let (outstanding, pool) = self.chain.query(|keeper, ctx| {
            Ok((keeper.total_rewards(ctx)?, keeper.query_community_pool(ctx)?))
        })?;
        let module_balance = self.chain.bank.balance_of(self.chain.keeper.module_account());
        Ok(SimSummary {
            seed: self.config.seed,
            height: self.chain.height,
            stats: self.stats.clone(),
            validators: self.chain.staking.validators().len(),
            delegations: self.chain.staking.delegations().len(),
            outstanding_rewards: display_or_zero(&outstanding),
            community_pool: display_or_zero(&pool),
            module_balance: module_balance.to_string(),
        })
    }
}

fn display_or_zero(coins: &DecCoins) -> String {
    if coins.is_zero() {
        "0".to_string()
    } else {
        coins.to_string()
    }
}
