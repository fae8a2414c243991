//! In-Memory Transactional Store
//!
//! Implements the `TransactionalStore` contract with optimistic concurrency:
//! each attempt runs the unit against a cloned snapshot of the full state,
//! tracking the version of every record it observes or writes. Commit
//! re-checks those versions under the lock and applies the write set only if
//! nothing moved underneath; otherwise the unit re-runs against a fresh
//! snapshot, up to the configured retry budget.
//!
//! This is the deterministic double used by tests and the development
//! binary. A durable backend implements the same trait against a real
//! transactional engine.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StoreConfig;
use crate::core_types::{AccountId, ChallengeId, OrderId, TransferId, UserId};
use crate::error::BankError;
use crate::iban::Iban;
use crate::ledger::model::{Account, AccountKind, LedgerEntry};
use crate::standing_order::{OrderStatus, StandingOrder};
use crate::tan::TanChallenge;
use crate::transfer::Transfer;

use super::store::{LedgerTx, TransactionalStore};

#[derive(Debug, Clone)]
struct Versioned<T> {
    value: T,
    version: u64,
}

#[derive(Default, Clone)]
struct State {
    accounts: HashMap<AccountId, Versioned<Account>>,
    transfers: HashMap<TransferId, Versioned<Transfer>>,
    challenges: HashMap<ChallengeId, Versioned<TanChallenge>>,
    orders: HashMap<OrderId, Versioned<StandingOrder>>,
    entries: Vec<LedgerEntry>,
}

/// Version 0 means "absent"; the first committed write stores version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RecordKey {
    Account(AccountId),
    Transfer(TransferId),
    Challenge(ChallengeId),
    Order(OrderId),
}

impl State {
    fn version_of(&self, key: RecordKey) -> u64 {
        match key {
            RecordKey::Account(id) => self.accounts.get(&id).map_or(0, |v| v.version),
            RecordKey::Transfer(id) => self.transfers.get(&id).map_or(0, |v| v.version),
            RecordKey::Challenge(id) => self.challenges.get(&id).map_or(0, |v| v.version),
            RecordKey::Order(id) => self.orders.get(&id).map_or(0, |v| v.version),
        }
    }
}

/// Snapshot-backed transaction handle.
struct MemoryTx {
    snapshot: State,
    /// Record versions as of the snapshot, for every key observed or written.
    observed: HashMap<RecordKey, u64>,
    dirty: HashSet<RecordKey>,
    appended: Vec<LedgerEntry>,
}

impl MemoryTx {
    fn new(snapshot: State) -> Self {
        Self {
            snapshot,
            observed: HashMap::new(),
            dirty: HashSet::new(),
            appended: Vec::new(),
        }
    }

    /// Register the pre-transaction version of a key. Own writes never bump
    /// snapshot versions, so later touches see the original value.
    fn touch(&mut self, key: RecordKey) {
        let version = self.snapshot.version_of(key);
        self.observed.entry(key).or_insert(version);
    }

    /// Validate the observed versions against `state` and apply the write
    /// set. Returns false on conflict (caller re-runs the unit).
    fn commit(self, state: &mut State) -> bool {
        for (key, version) in &self.observed {
            if state.version_of(*key) != *version {
                return false;
            }
        }
        for key in self.dirty {
            let next_version = state.version_of(key) + 1;
            match key {
                RecordKey::Account(id) => {
                    if let Some(v) = self.snapshot.accounts.get(&id) {
                        state.accounts.insert(
                            id,
                            Versioned {
                                value: v.value.clone(),
                                version: next_version,
                            },
                        );
                    }
                }
                RecordKey::Transfer(id) => {
                    if let Some(v) = self.snapshot.transfers.get(&id) {
                        state.transfers.insert(
                            id,
                            Versioned {
                                value: v.value.clone(),
                                version: next_version,
                            },
                        );
                    }
                }
                RecordKey::Challenge(id) => {
                    if let Some(v) = self.snapshot.challenges.get(&id) {
                        state.challenges.insert(
                            id,
                            Versioned {
                                value: v.value.clone(),
                                version: next_version,
                            },
                        );
                    }
                }
                RecordKey::Order(id) => {
                    if let Some(v) = self.snapshot.orders.get(&id) {
                        state.orders.insert(
                            id,
                            Versioned {
                                value: v.value.clone(),
                                version: next_version,
                            },
                        );
                    }
                }
            }
        }
        state.entries.extend(self.appended);
        true
    }
}

impl LedgerTx for MemoryTx {
    fn account(&mut self, id: AccountId) -> Result<Option<Account>, BankError> {
        self.touch(RecordKey::Account(id));
        Ok(self.snapshot.accounts.get(&id).map(|v| v.value.clone()))
    }

    fn put_account(&mut self, account: Account) {
        let key = RecordKey::Account(account.id);
        self.touch(key);
        let version = self.snapshot.version_of(key);
        self.snapshot
            .accounts
            .insert(account.id, Versioned { value: account, version });
        self.dirty.insert(key);
    }

    fn account_by_iban(&mut self, iban: &Iban) -> Result<Option<Account>, BankError> {
        let found = self
            .snapshot
            .accounts
            .values()
            .find(|v| &v.value.iban == iban)
            .map(|v| v.value.clone());
        if let Some(acc) = &found {
            self.touch(RecordKey::Account(acc.id));
        }
        Ok(found)
    }

    fn checking_account_of(&mut self, owner: UserId) -> Result<Option<Account>, BankError> {
        let found = self
            .snapshot
            .accounts
            .values()
            .find(|v| v.value.owner == owner && v.value.kind == AccountKind::Checking)
            .map(|v| v.value.clone());
        if let Some(acc) = &found {
            self.touch(RecordKey::Account(acc.id));
        }
        Ok(found)
    }

    fn transfer(&mut self, id: TransferId) -> Result<Option<Transfer>, BankError> {
        self.touch(RecordKey::Transfer(id));
        Ok(self.snapshot.transfers.get(&id).map(|v| v.value.clone()))
    }

    fn put_transfer(&mut self, transfer: Transfer) {
        let key = RecordKey::Transfer(transfer.id);
        self.touch(key);
        let version = self.snapshot.version_of(key);
        self.snapshot
            .transfers
            .insert(transfer.id, Versioned { value: transfer, version });
        self.dirty.insert(key);
    }

    fn transfers_awaiting_tan(&mut self) -> Result<Vec<Transfer>, BankError> {
        let mut pending: Vec<Transfer> = self
            .snapshot
            .transfers
            .values()
            .filter(|v| !v.value.status.is_terminal())
            .map(|v| v.value.clone())
            .collect();
        pending.sort_by_key(|t| t.id);
        for t in &pending {
            self.touch(RecordKey::Transfer(t.id));
        }
        Ok(pending)
    }

    fn challenge(&mut self, id: ChallengeId) -> Result<Option<TanChallenge>, BankError> {
        self.touch(RecordKey::Challenge(id));
        Ok(self.snapshot.challenges.get(&id).map(|v| v.value.clone()))
    }

    fn put_challenge(&mut self, challenge: TanChallenge) {
        let key = RecordKey::Challenge(challenge.id);
        self.touch(key);
        let version = self.snapshot.version_of(key);
        self.snapshot
            .challenges
            .insert(challenge.id, Versioned { value: challenge, version });
        self.dirty.insert(key);
    }

    fn standing_order(&mut self, id: OrderId) -> Result<Option<StandingOrder>, BankError> {
        self.touch(RecordKey::Order(id));
        Ok(self.snapshot.orders.get(&id).map(|v| v.value.clone()))
    }

    fn put_standing_order(&mut self, order: StandingOrder) {
        let key = RecordKey::Order(order.id);
        self.touch(key);
        let version = self.snapshot.version_of(key);
        self.snapshot
            .orders
            .insert(order.id, Versioned { value: order, version });
        self.dirty.insert(key);
    }

    fn append_entry(&mut self, entry: LedgerEntry) {
        self.appended.push(entry);
    }
}

/// In-memory store with snapshot isolation and bounded optimistic retry.
pub struct MemoryStore {
    state: Mutex<State>,
    max_retries: u32,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_retries: config.max_retries,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Mutex poisoning only happens if a holder panicked; propagating the
        // panic here is the least surprising behavior for a test double.
        self.state.lock().expect("memory store lock poisoned")
    }

    /// Force a version bump on an account record, simulating a concurrent
    /// writer landing between snapshot and commit.
    #[cfg(test)]
    pub(crate) fn interfere_with_account(&self, id: AccountId) {
        let mut state = self.lock();
        if let Some(v) = state.accounts.get_mut(&id) {
            v.version += 1;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn run_atomic<F, T>(&self, mut unit: F) -> Result<T, BankError>
    where
        F: FnMut(&mut dyn LedgerTx) -> Result<T, BankError> + Send,
        T: Send,
    {
        for attempt in 0..=self.max_retries {
            let snapshot = self.lock().clone();
            let mut tx = MemoryTx::new(snapshot);
            // A unit returning Err aborts immediately: nothing to retry,
            // nothing committed.
            let out = unit(&mut tx)?;
            let mut state = self.lock();
            if tx.commit(&mut state) {
                return Ok(out);
            }
            drop(state);
            tracing::trace!(attempt, "atomic unit conflicted, re-running");
        }
        Err(BankError::ConflictExceeded)
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, BankError> {
        Ok(self.lock().accounts.get(&id).map(|v| v.value.clone()))
    }

    async fn load_accounts_of(&self, owner: UserId) -> Result<Vec<Account>, BankError> {
        let mut accounts: Vec<Account> = self
            .lock()
            .accounts
            .values()
            .filter(|v| v.value.owner == owner)
            .map(|v| v.value.clone())
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn load_account_by_iban(&self, iban: &Iban) -> Result<Option<Account>, BankError> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|v| &v.value.iban == iban)
            .map(|v| v.value.clone()))
    }

    async fn load_transfer(&self, id: TransferId) -> Result<Option<Transfer>, BankError> {
        Ok(self.lock().transfers.get(&id).map(|v| v.value.clone()))
    }

    async fn load_entries_of(
        &self,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, BankError> {
        let state = self.lock();
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.account_id == account)
            .cloned()
            .collect();
        entries.reverse(); // newest first
        entries.truncate(limit);
        Ok(entries)
    }

    async fn load_orders_of(&self, owner: UserId) -> Result<Vec<StandingOrder>, BankError> {
        let mut orders: Vec<StandingOrder> = self
            .lock()
            .orders
            .values()
            .filter(|v| v.value.owner == owner)
            .map(|v| v.value.clone())
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn due_orders(&self, now: DateTime<Utc>) -> Result<Vec<StandingOrder>, BankError> {
        let mut due: Vec<StandingOrder> = self
            .lock()
            .orders
            .values()
            .filter(|v| v.value.status == OrderStatus::Active && v.value.next_run_at <= now)
            .map(|v| v.value.clone())
            .collect();
        due.sort_by_key(|o| (o.next_run_at, o.id));
        Ok(due)
    }
}
