//! Transactional Store Port
//!
//! Every balance-affecting operation passes through `run_atomic`: the closure
//! receives transactional read/write handles, sees a consistent snapshot plus
//! its own writes, and either commits as one indivisible unit or leaves no
//! trace. The store retries the whole unit on write conflicts up to a bounded
//! count and surfaces `ConflictExceeded` past it.
//!
//! Values read outside a unit (the `load_*` methods) are advisory snapshots
//! and must never be trusted inside a later unit — re-read through the
//! transaction handle instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core_types::{AccountId, ChallengeId, OrderId, TransferId, UserId};
use crate::error::BankError;
use crate::iban::Iban;
use crate::ledger::model::{Account, LedgerEntry};
use crate::standing_order::StandingOrder;
use crate::tan::TanChallenge;
use crate::transfer::Transfer;

/// Transactional read/write handle passed to an atomic unit.
///
/// Reads take `&mut self` because they register the observed record versions
/// for conflict detection at commit time.
pub trait LedgerTx {
    fn account(&mut self, id: AccountId) -> Result<Option<Account>, BankError>;
    fn put_account(&mut self, account: Account);

    /// Resolve an account by its external identifier.
    fn account_by_iban(&mut self, iban: &Iban) -> Result<Option<Account>, BankError>;
    /// Resolve a user's checking account (the P2P settlement account).
    fn checking_account_of(&mut self, owner: UserId) -> Result<Option<Account>, BankError>;

    fn transfer(&mut self, id: TransferId) -> Result<Option<Transfer>, BankError>;
    fn put_transfer(&mut self, transfer: Transfer);
    /// Transfers still waiting for TAN confirmation (expiry sweep input).
    fn transfers_awaiting_tan(&mut self) -> Result<Vec<Transfer>, BankError>;

    fn challenge(&mut self, id: ChallengeId) -> Result<Option<TanChallenge>, BankError>;
    fn put_challenge(&mut self, challenge: TanChallenge);

    fn standing_order(&mut self, id: OrderId) -> Result<Option<StandingOrder>, BankError>;
    fn put_standing_order(&mut self, order: StandingOrder);

    /// Append an immutable ledger entry. Entries are never updated.
    fn append_entry(&mut self, entry: LedgerEntry);
}

/// Atomic transaction facility over account, transfer, challenge, order and
/// ledger records.
///
/// # Contract
/// - At least snapshot isolation: a unit observes a consistent state as of
///   its start, plus its own writes.
/// - Conflict detection: a commit fails if any record the unit observed or
///   wrote changed underneath it; the store re-runs the unit.
/// - Bounded retry: after the configured retry budget the call fails with
///   `ConflictExceeded` and no changes are applied.
/// - A unit returning `Err` aborts with no externally observable effect.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn run_atomic<F, T>(&self, unit: F) -> Result<T, BankError>
    where
        F: FnMut(&mut dyn LedgerTx) -> Result<T, BankError> + Send,
        T: Send;

    // Non-transactional snapshot reads for listings and advisory checks.

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, BankError>;
    async fn load_accounts_of(&self, owner: UserId) -> Result<Vec<Account>, BankError>;
    async fn load_account_by_iban(&self, iban: &Iban) -> Result<Option<Account>, BankError>;
    async fn load_transfer(&self, id: TransferId) -> Result<Option<Transfer>, BankError>;
    async fn load_entries_of(
        &self,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, BankError>;
    async fn load_orders_of(&self, owner: UserId) -> Result<Vec<StandingOrder>, BankError>;
    /// Active standing orders with `next_run_at <= now`.
    async fn due_orders(&self, now: DateTime<Utc>) -> Result<Vec<StandingOrder>, BankError>;
}
