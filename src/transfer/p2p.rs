//! P2P Transfer Executor
//!
//! Single-phase transfers between two users of the institution, settled
//! between their checking accounts. No TAN step; the only funds check is the
//! hard one inside the atomic unit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::core_types::UserId;
use crate::error::BankError;
use crate::ledger::model::LedgerEntry;
use crate::ledger::store::TransactionalStore;
use crate::money::{Amount, Currency};

use super::types::{ExecuteReceipt, RecipientRef, Transfer};

pub struct PeerTransferService<S> {
    store: Arc<S>,
}

impl<S: TransactionalStore> PeerTransferService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn transfer(
        &self,
        sender: UserId,
        recipient: UserId,
        amount: Amount,
        currency: Currency,
        message: String,
    ) -> Result<ExecuteReceipt, BankError> {
        self.transfer_at(sender, recipient, amount, currency, message, Utc::now())
            .await
    }

    /// Entirely succeeds or entirely aborts: account resolution, funds check,
    /// both mutations and the Sent/Received entry pair share one unit.
    pub async fn transfer_at(
        &self,
        sender: UserId,
        recipient: UserId,
        amount: Amount,
        currency: Currency,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<ExecuteReceipt, BankError> {
        if !amount.is_positive() {
            return Err(BankError::InvalidAmount);
        }
        if sender == recipient {
            return Err(BankError::SameAccount);
        }

        let receipt = self
            .store
            .run_atomic(|tx| {
                let mut source = tx
                    .checking_account_of(sender)?
                    .ok_or(BankError::AccountNotFound)?;
                let mut target = tx
                    .checking_account_of(recipient)?
                    .ok_or(BankError::AccountNotFound)?;
                if source.currency != currency || target.currency != currency {
                    return Err(BankError::CurrencyMismatch {
                        account: source.currency.as_str().into(),
                        requested: currency.as_str().into(),
                    });
                }
                if !source.covers(amount) {
                    return Err(BankError::InsufficientFunds);
                }
                source.debit(amount)?;
                target.credit(amount)?;

                let transfer = Transfer::executed_single_phase(
                    sender,
                    source.id,
                    RecipientRef::Internal(target.id),
                    amount,
                    currency,
                    message.clone(),
                    now,
                );
                let (debit, credit) = LedgerEntry::pair(
                    transfer.id,
                    source.id,
                    target.id,
                    amount,
                    target.iban.to_string(),
                    source.iban.to_string(),
                    now,
                );
                let receipt = ExecuteReceipt {
                    transfer_id: transfer.id,
                    executed_at: now,
                };

                tx.put_account(source);
                tx.put_account(target);
                tx.put_transfer(transfer);
                tx.append_entry(debit);
                tx.append_entry(credit);
                Ok(receipt)
            })
            .await?;

        info!(
            transfer_id = %receipt.transfer_id,
            sender = %sender,
            recipient = %recipient,
            "Peer transfer executed"
        );
        Ok(receipt)
    }
}
