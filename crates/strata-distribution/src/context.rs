//! Explicit per-block handle threaded through every distribution operation.
//!
//! A [`Context`] borrows the ledger store, the staking view and the bank for one
//! unit of work at a fixed block height. Two nested forms exist:
//!
//! - [`Context::with_transaction`]: runs a closure over a copy-on-write store and
//!   a recording bank; store writes, transfers and events are applied only if
//!   the closure returns `Ok`.
//! - [`Context::speculative`]: the same overlay, always discarded. Used by
//!   invariant checks and reward queries.

use strata_store::{CacheStore, KvStore};
use strata_types::{AccountId, Coins};

use crate::events::Event;
use crate::expected::{BankError, BankKeeper, StakingKeeper};
use crate::ledger::RewardLedger;
use crate::Result;

pub struct Context<'a> {
    store: &'a mut dyn KvStore,
    staking: &'a dyn StakingKeeper,
    bank: &'a mut dyn BankKeeper,
    height: u64,
    events: Vec<Event>,
}

impl<'a> Context<'a> {
    pub fn new(
        store: &'a mut dyn KvStore,
        staking: &'a dyn StakingKeeper,
        bank: &'a mut dyn BankKeeper,
        height: u64,
    ) -> Self {
        Self {
            store,
            staking,
            bank,
            height,
            events: Vec::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn ledger(&mut self) -> RewardLedger<'_> {
        RewardLedger::new(&mut *self.store)
    }

    pub fn staking(&self) -> &'a dyn StakingKeeper {
        self.staking
    }

    pub fn bank(&mut self) -> &mut dyn BankKeeper {
        &mut *self.bank
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Run `f` atomically: its store writes, bank transfers and events reach this
    /// context only if it returns `Ok`.
    pub fn with_transaction<T>(&mut self, f: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        let (result, writes, transfers, events) = {
            let mut cache = CacheStore::new(&*self.store);
            let mut bank = OverlayBank::new(&*self.bank);
            let (result, events) = {
                let mut tx = Context::new(&mut cache, self.staking, &mut bank, self.height);
                let result = f(&mut tx);
                (result, tx.take_events())
            };
            (result, cache.into_writes(), bank.into_transfers(), events)
        };

        let value = result?;
        self.store.apply(writes)?;
        for transfer in transfers {
            self.bank.send(&transfer.from, &transfer.to, &transfer.amount)?;
        }
        self.events.extend(events);
        Ok(value)
    }

    /// Run `f` against a disposable overlay. Nothing it does is persisted.
    pub fn speculative<T>(&self, f: impl FnOnce(&mut Context<'_>) -> T) -> T {
        let mut cache = CacheStore::new(&*self.store);
        let mut bank = OverlayBank::new(&*self.bank);
        let mut overlay = Context::new(&mut cache, self.staking, &mut bank, self.height);
        f(&mut overlay)
    }
}

#[derive(Debug, Clone)]
struct Transfer {
    from: AccountId,
    to: AccountId,
    amount: Coins,
}

/// Bank view that applies transfers to a private copy of the touched balances
/// and records them for replay.
struct OverlayBank<'b> {
    inner: &'b dyn BankKeeper,
    balances: std::collections::BTreeMap<AccountId, Coins>,
    transfers: Vec<Transfer>,
}

impl<'b> OverlayBank<'b> {
    fn new(inner: &'b dyn BankKeeper) -> Self {
        Self {
            inner,
            balances: Default::default(),
            transfers: Vec::new(),
        }
    }

    fn into_transfers(self) -> Vec<Transfer> {
        self.transfers
    }
}

impl BankKeeper for OverlayBank<'_> {
    fn balance(&self, account: &AccountId) -> Coins {
        self.balances
            .get(account)
            .cloned()
            .unwrap_or_else(|| self.inner.balance(account))
    }

    fn send(&mut self, from: &AccountId, to: &AccountId, amount: &Coins) -> std::result::Result<(), BankError> {
        let available = self.balance(from);
        let debited = available
            .checked_sub(amount)
            .ok_or_else(|| BankError::InsufficientFunds {
                account: from.clone(),
                available: available.clone(),
                required: amount.clone(),
            })?;
        self.balances.insert(from.clone(), debited);
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| BankError::Overflow(to.clone()))?;
        self.balances.insert(to.clone(), credited);
        self.transfers.push(Transfer {
            from: from.clone(),
            to: to.clone(),
            amount: amount.clone(),
        });
        Ok(())
    }
}
