//! In-memory staking and bank modules plus a small chain driver.
//!
//! [`TestChain`] fires the staking hooks in the same order a real staking module
//! would, so tests and the simulator exercise distribution exactly as a node
//! does. Bonding does not move bank balances; only rewards and fees do.

use std::collections::BTreeMap;

use strata_store::{KvStore, MemStore};
use strata_types::{AccountId, Coins, ConsAddress, Dec, DecCoins, Params, ValidatorId, VoteInfo, BOND_DENOM};

use crate::expected::{BankError, BankKeeper, DelegationInfo, StakingKeeper, ValidatorInfo};
use crate::hooks::StakingHooks;
use crate::{Context, DistributionError, Keeper, Result};

/// Deterministic consensus address derived from an operator name.
pub fn cons_address_for(operator: &AccountId) -> ConsAddress {
    let mut bytes = [0u8; ConsAddress::LEN];
    for (i, b) in operator.as_str().bytes().enumerate() {
        bytes[i % ConsAddress::LEN] ^= b.rotate_left((i / ConsAddress::LEN) as u32);
    }
    bytes[ConsAddress::LEN - 1] ^= operator.as_str().len() as u8;
    ConsAddress::new(bytes)
}

#[derive(Debug, Clone, Default)]
pub struct MockStaking {
    validators: BTreeMap<ValidatorId, ValidatorInfo>,
    delegations: BTreeMap<(ValidatorId, AccountId), DelegationInfo>,
}

impl MockStaking {
    pub fn insert_validator(&mut self, validator: ValidatorInfo) {
        self.validators.insert(validator.operator.clone(), validator);
    }

    pub fn remove_validator(&mut self, operator: &ValidatorId) -> Option<ValidatorInfo> {
        self.delegations.retain(|(v, _), _| v != operator);
        self.validators.remove(operator)
    }

    /// Overwrite a validator's bonded tokens without touching its shares.
    pub fn set_tokens(&mut self, operator: &ValidatorId, tokens: u64) {
        if let Some(v) = self.validators.get_mut(operator) {
            v.tokens = tokens;
        }
    }

    /// Bond `amount` tokens and return the shares issued.
    pub fn add_delegation(&mut self, delegator: &AccountId, operator: &ValidatorId, amount: u64) -> Option<Dec> {
        let validator = self.validators.get_mut(operator)?;
        let shares = validator.shares_from_tokens(amount);
        validator.tokens = validator.tokens.saturating_add(amount);
        validator.delegator_shares = &validator.delegator_shares + &shares;

        let delegation = self
            .delegations
            .entry((operator.clone(), delegator.clone()))
            .or_insert_with(|| DelegationInfo {
                delegator: delegator.clone(),
                validator: operator.clone(),
                shares: Dec::zero(),
            });
        delegation.shares = &delegation.shares + &shares;
        Some(shares)
    }

    /// Unbond `shares`. Returns the tokens released and whether the delegation
    /// is now gone.
    pub fn remove_shares(&mut self, delegator: &AccountId, operator: &ValidatorId, shares: &Dec) -> Option<(u64, bool)> {
        let key = (operator.clone(), delegator.clone());
        let validator = self.validators.get_mut(operator)?;
        let delegation = self.delegations.get_mut(&key)?;
        if *shares > delegation.shares || !shares.is_positive() {
            return None;
        }

        let tokens = validator
            .tokens_from_shares_truncated(shares)
            .truncate_u64()
            .unwrap_or(0)
            .min(validator.tokens);
        validator.tokens -= tokens;
        validator.delegator_shares = &validator.delegator_shares - shares;
        delegation.shares = &delegation.shares - shares;

        let removed = delegation.shares.is_zero();
        if removed {
            self.delegations.remove(&key);
        }
        Some((tokens, removed))
    }

    /// Burn `fraction` of the validator's tokens, rounding the burn down.
    pub fn slash_tokens(&mut self, operator: &ValidatorId, fraction: &Dec) {
        if let Some(v) = self.validators.get_mut(operator) {
            let burned = Dec::from(v.tokens).mul_truncate(fraction).truncate_u64().unwrap_or(0);
            v.tokens = v.tokens.saturating_sub(burned);
        }
    }
}

impl StakingKeeper for MockStaking {
    fn validator(&self, operator: &ValidatorId) -> Option<ValidatorInfo> {
        self.validators.get(operator).cloned()
    }

    fn validator_by_cons_addr(&self, address: &ConsAddress) -> Option<ValidatorInfo> {
        self.validators.values().find(|v| &v.cons_address == address).cloned()
    }

    fn delegation(&self, delegator: &AccountId, validator: &ValidatorId) -> Option<DelegationInfo> {
        self.delegations
            .get(&(validator.clone(), delegator.clone()))
            .cloned()
    }

    fn validators(&self) -> Vec<ValidatorInfo> {
        self.validators.values().cloned().collect()
    }

    fn delegations(&self) -> Vec<DelegationInfo> {
        self.delegations.values().cloned().collect()
    }

    fn delegator_delegations(&self, delegator: &AccountId) -> Vec<DelegationInfo> {
        self.delegations
            .values()
            .filter(|d| &d.delegator == delegator)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBank {
    balances: BTreeMap<AccountId, Coins>,
}

impl MockBank {
    /// Create `amount` out of thin air. Saturates instead of overflowing.
    pub fn mint(&mut self, account: &AccountId, amount: &Coins) {
        let current = self.balance_of(account);
        let mut merged: BTreeMap<String, u64> = current.iter().map(|(d, a)| (d.to_string(), a)).collect();
        for (denom, a) in amount.iter() {
            let slot = merged.entry(denom.to_string()).or_insert(0);
            *slot = slot.saturating_add(a);
        }
        self.balances.insert(account.clone(), merged.into_iter().collect());
    }

    pub fn balance_of(&self, account: &AccountId) -> Coins {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    /// Sum of every balance.
    pub fn supply(&self) -> Coins {
        let mut total: BTreeMap<String, u64> = BTreeMap::new();
        for coins in self.balances.values() {
            for (denom, a) in coins.iter() {
                let slot = total.entry(denom.to_string()).or_insert(0);
                *slot = slot.saturating_add(a);
            }
        }
        total.into_iter().collect()
    }
}

impl BankKeeper for MockBank {
    fn balance(&self, account: &AccountId) -> Coins {
        self.balance_of(account)
    }

    fn send(&mut self, from: &AccountId, to: &AccountId, amount: &Coins) -> std::result::Result<(), BankError> {
        let available = self.balance_of(from);
        let debited = available
            .checked_sub(amount)
            .ok_or_else(|| BankError::InsufficientFunds {
                account: from.clone(),
                available: available.clone(),
                required: amount.clone(),
            })?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(to.clone()))?;
        self.balances.insert(from.clone(), debited);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }
}

/// A single-node chain: store, staking, bank and the distribution keeper.
pub struct TestChain {
    pub store: Box<dyn KvStore>,
    pub staking: MockStaking,
    pub bank: MockBank,
    pub keeper: Keeper,
    pub height: u64,
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TestChain {
    /// In-memory chain at height 1 with default params.
    pub fn new() -> Self {
        Self::with_store(Box::new(MemStore::new()), &Params::default()).expect("initialize in-memory chain")
    }

    pub fn with_store(store: Box<dyn KvStore>, params: &Params) -> Result<Self> {
        let mut chain = Self {
            store,
            staking: MockStaking::default(),
            bank: MockBank::default(),
            keeper: Keeper::default(),
            height: 1,
        };
        chain.run(|keeper, ctx| keeper.initialize(ctx, params))?;
        Ok(chain)
    }

    /// Run `f` as one transaction at the current height.
    pub fn run<T>(&mut self, f: impl FnOnce(&Keeper, &mut Context<'_>) -> Result<T>) -> Result<T> {
        let Self {
            store,
            staking,
            bank,
            keeper,
            height,
        } = self;
        let mut ctx = Context::new(store.as_mut(), staking, bank, *height);
        ctx.with_transaction(|tx| f(keeper, tx))
    }

    /// Run `f` against a discarded overlay.
    pub fn query<T>(&mut self, f: impl FnOnce(&Keeper, &mut Context<'_>) -> Result<T>) -> Result<T> {
        let Self {
            store,
            staking,
            bank,
            keeper,
            height,
        } = self;
        let ctx = Context::new(store.as_mut(), staking, bank, *height);
        ctx.speculative(|overlay| f(keeper, overlay))
    }

    pub fn next_block(&mut self) {
        self.height += 1;
    }

    pub fn cons_address(&self, operator: &ValidatorId) -> ConsAddress {
        cons_address_for(operator)
    }

    /// Register a validator and bond its self-delegation.
    pub fn create_validator(&mut self, name: &str, commission_rate: Dec, self_bond: u64) -> Result<ValidatorId> {
        let operator = AccountId::from(name);
        self.staking.insert_validator(ValidatorInfo {
            operator: operator.clone(),
            cons_address: cons_address_for(&operator),
            tokens: 0,
            delegator_shares: Dec::zero(),
            commission_rate,
        });
        self.run(|keeper, ctx| keeper.after_validator_created(ctx, &operator))?;
        self.delegate(&operator, &operator, self_bond)?;
        Ok(operator)
    }

    /// Bond `amount` tokens from `delegator` to `validator`.
    pub fn delegate(&mut self, delegator: &AccountId, validator: &ValidatorId, amount: u64) -> Result<Dec> {
        if self.staking.delegation(delegator, validator).is_some() {
            self.run(|keeper, ctx| keeper.before_delegation_shares_modified(ctx, delegator, validator))?;
        } else {
            self.run(|keeper, ctx| keeper.before_delegation_created(ctx, delegator, validator))?;
        }
        let shares = self
            .staking
            .add_delegation(delegator, validator, amount)
            .ok_or(DistributionError::NoValidatorDistInfo)?;
        self.run(|keeper, ctx| keeper.after_delegation_modified(ctx, delegator, validator))?;
        Ok(shares)
    }

    /// Unbond `shares`, returning the tokens released.
    ///
    /// The amount is checked against the delegation before any hook fires, so a
    /// rejected unbond leaves distribution untouched.
    pub fn undelegate(&mut self, delegator: &AccountId, validator: &ValidatorId, shares: Dec) -> Result<u64> {
        let delegation = self
            .staking
            .delegation(delegator, validator)
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;
        if shares > delegation.shares || !shares.is_positive() {
            return Err(DistributionError::InvalidMsg(format!(
                "cannot unbond {shares} shares from a delegation of {}",
                delegation.shares
            )));
        }

        self.run(|keeper, ctx| keeper.before_delegation_shares_modified(ctx, delegator, validator))?;
        let (tokens, removed) = self
            .staking
            .remove_shares(delegator, validator, &shares)
            .ok_or(DistributionError::EmptyDelegationDistInfo)?;
        if removed {
            self.run(|keeper, ctx| keeper.before_delegation_removed(ctx, delegator, validator))?;
        } else {
            self.run(|keeper, ctx| keeper.after_delegation_modified(ctx, delegator, validator))?;
        }
        Ok(tokens)
    }

    /// Record the slash with distribution, then burn the tokens.
    pub fn slash(&mut self, validator: &ValidatorId, fraction: Dec) -> Result<()> {
        self.run(|keeper, ctx| keeper.before_validator_slashed(ctx, validator, fraction.clone()))?;
        self.staking.slash_tokens(validator, &fraction);
        Ok(())
    }

    /// Drop the validator from staking and release its distribution records.
    pub fn remove_validator(&mut self, validator: &ValidatorId) -> Result<()> {
        self.staking
            .remove_validator(validator)
            .ok_or(DistributionError::NoValidatorDistInfo)?;
        self.run(|keeper, ctx| keeper.after_validator_removed(ctx, validator))
    }

    /// Mint `amount` of the bond denom into the module account and credit it to
    /// the validator, bypassing the fee split.
    pub fn allocate_to_validator(&mut self, validator: &ValidatorId, amount: u64) -> Result<()> {
        let coins = Coins::single(BOND_DENOM, amount);
        self.bank.mint(self.keeper.module_account(), &coins);
        self.run(|keeper, ctx| {
            let info = ctx
                .staking()
                .validator(validator)
                .ok_or(DistributionError::NoValidatorDistInfo)?;
            keeper.allocate_tokens_to_validator(ctx, &info, &DecCoins::from(&coins))
        })
    }

    /// Mint fees into the fee collector, as the ante handler would.
    pub fn collect_fees(&mut self, fees: &Coins) {
        self.bank.mint(self.keeper.fee_collector(), fees);
    }

    /// Votes from every validator with bonded tokens, all signed.
    pub fn last_commit(&self) -> Vec<VoteInfo> {
        self.staking
            .validators()
            .into_iter()
            .filter(|v| v.tokens > 0)
            .map(|v| VoteInfo {
                address: v.cons_address,
                power: i64::try_from(v.tokens).unwrap_or(i64::MAX),
                signed_last_block: true,
            })
            .collect()
    }

    /// Collect `fees`, run the keeper's block entry point and advance the height.
    pub fn begin_block(&mut self, proposer: &ValidatorId, fees: &Coins, votes: &[VoteInfo]) -> Result<()> {
        self.collect_fees(fees);
        let address = cons_address_for(proposer);
        self.run(|keeper, ctx| keeper.begin_block(ctx, &address, votes))?;
        self.next_block();
        Ok(())
    }
}
