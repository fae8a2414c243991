//! Account and ledger entry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, EntryId, TransferId, UserId};
use crate::error::BankError;
use crate::iban::Iban;
use crate::money::{Amount, Currency};

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Checking,
    Savings,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "Checking",
            AccountKind::Savings => "Savings",
        }
    }
}

/// A customer account holding a balance in one currency.
///
/// # Invariants (enforced by the private balance field):
/// - The balance never goes negative; a debit that would do so is rejected.
/// - All mutations use checked arithmetic and return Result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: UserId,
    pub kind: AccountKind,
    balance: Amount,
    pub currency: Currency,
    pub iban: Iban,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new account with a zero balance.
    pub fn open(
        owner: UserId,
        kind: AccountKind,
        currency: Currency,
        iban: Iban,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            owner,
            kind,
            balance: Amount::ZERO,
            currency,
            iban,
            created_at: now,
        }
    }

    /// Current balance (read-only).
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Remove funds. Fails with `InsufficientFunds` if the result would be
    /// negative; overdraft is not modeled.
    pub fn debit(&mut self, amount: Amount) -> Result<(), BankError> {
        if !amount.is_positive() {
            return Err(BankError::InvalidAmount);
        }
        let next = self.balance.checked_sub(amount)?;
        if next < Amount::ZERO {
            return Err(BankError::InsufficientFunds);
        }
        self.balance = next;
        Ok(())
    }

    /// Add funds, with overflow protection.
    pub fn credit(&mut self, amount: Amount) -> Result<(), BankError> {
        if !amount.is_positive() {
            return Err(BankError::InvalidAmount);
        }
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }

    /// Advisory check used outside a transaction; never authoritative.
    pub fn covers(&self, amount: Amount) -> bool {
        self.balance >= amount
    }

    #[cfg(test)]
    pub(crate) fn with_balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }
}

/// Ledger entry direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "DEBIT",
            Direction::Credit => "CREDIT",
        }
    }
}

/// One side of a committed transfer. Append-only: an entry is never mutated
/// once written.
///
/// `amount` is signed: negative for debits, positive for credits, so the two
/// entries of a transfer always sum to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub direction: Direction,
    pub amount: Amount,
    pub counterparty: String,
    pub related_transfer_id: TransferId,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build the debit/credit pair for a committed transfer.
    pub fn pair(
        transfer_id: TransferId,
        debit_account: AccountId,
        credit_account: AccountId,
        amount: Amount,
        debit_counterparty: String,
        credit_counterparty: String,
        now: DateTime<Utc>,
    ) -> (LedgerEntry, LedgerEntry) {
        let debit = LedgerEntry {
            id: EntryId::new(),
            account_id: debit_account,
            direction: Direction::Debit,
            amount: amount.negated(),
            counterparty: debit_counterparty,
            related_transfer_id: transfer_id,
            created_at: now,
        };
        let credit = LedgerEntry {
            id: EntryId::new(),
            account_id: credit_account,
            direction: Direction::Credit,
            amount,
            counterparty: credit_counterparty,
            related_transfer_id: transfer_id,
            created_at: now,
        };
        (debit, credit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance_minor: i64) -> Account {
        let mut rng = rand::thread_rng();
        Account::open(
            UserId(1),
            AccountKind::Checking,
            Currency::Eur,
            Iban::generate_de(&mut rng),
            Utc::now(),
        )
        .with_balance(Amount::from_minor(balance_minor))
    }

    #[test]
    fn test_debit_and_credit() {
        let mut acc = account(150_000);
        acc.debit(Amount::from_minor(20_000)).unwrap();
        assert_eq!(acc.balance(), Amount::from_minor(130_000));
        acc.credit(Amount::from_minor(5_000)).unwrap();
        assert_eq!(acc.balance(), Amount::from_minor(135_000));
    }

    #[test]
    fn test_debit_rejects_negative_result() {
        let mut acc = account(100);
        assert_eq!(
            acc.debit(Amount::from_minor(101)),
            Err(BankError::InsufficientFunds)
        );
        // Balance unchanged on rejection.
        assert_eq!(acc.balance(), Amount::from_minor(100));
    }

    #[test]
    fn test_zero_amount_mutations_rejected() {
        let mut acc = account(100);
        assert_eq!(acc.debit(Amount::ZERO), Err(BankError::InvalidAmount));
        assert_eq!(acc.credit(Amount::ZERO), Err(BankError::InvalidAmount));
    }

    #[test]
    fn test_entry_pair_balances() {
        let (debit, credit) = LedgerEntry::pair(
            TransferId::new(),
            AccountId::new(),
            AccountId::new(),
            Amount::from_minor(20_000),
            "DE89370400440532013000".into(),
            "sender".into(),
            Utc::now(),
        );
        assert_eq!(debit.direction, Direction::Debit);
        assert_eq!(credit.direction, Direction::Credit);
        assert_eq!(
            debit.amount.checked_add(credit.amount).unwrap(),
            Amount::ZERO
        );
        assert_eq!(debit.related_transfer_id, credit.related_transfer_id);
    }
}
