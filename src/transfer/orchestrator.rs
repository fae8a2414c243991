//! Transfer Orchestrator
//!
//! Drives the two-phase protocol: `initiate` validates the request and pairs
//! a pending transfer with a TAN challenge; `execute` verifies the challenge
//! and applies the ledger mutation. The entire execute step — TAN
//! consumption, balance re-check, both balance mutations, both ledger
//! entries, terminal status — is one atomic unit against the store. No caller
//! can observe a consumed TAN without a completed transfer, or vice versa.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::TanConfig;
use crate::core_types::{TransferId, UserId};
use crate::error::BankError;
use crate::ledger::model::{Account, LedgerEntry};
use crate::ledger::store::{LedgerTx, TransactionalStore};
use crate::tan::{TanManager, TanVerdict};

use super::status::TransferStatus;
use super::types::{
    ExecuteReceipt, ExecuteRequest, InitiateReceipt, InitiateRequest, RecipientRef, Transfer,
};

/// Outcome of the execute unit. Rejections that must persist state changes
/// (burned attempts, expiry transitions) commit and are mapped to errors
/// afterwards; aborting rejections return `Err` from the unit instead.
enum ExecuteOutcome {
    Executed(ExecuteReceipt),
    Rejected(BankError),
}

pub struct TransferOrchestrator<S> {
    store: Arc<S>,
    tan: TanManager<S>,
}

impl<S: TransactionalStore> TransferOrchestrator<S> {
    pub fn new(store: Arc<S>, tan_config: TanConfig) -> Self {
        let tan = TanManager::new(store.clone(), tan_config);
        Self { store, tan }
    }

    /// Phase one: validate, soft-check funds, persist the pending transfer
    /// and its challenge in one unit.
    pub async fn initiate(
        &self,
        sender: UserId,
        req: InitiateRequest,
    ) -> Result<InitiateReceipt, BankError> {
        self.initiate_at(sender, req, Utc::now()).await
    }

    pub async fn initiate_at(
        &self,
        sender: UserId,
        req: InitiateRequest,
        now: DateTime<Utc>,
    ) -> Result<InitiateReceipt, BankError> {
        if !req.amount.is_positive() {
            return Err(BankError::InvalidAmount);
        }

        let source = self
            .store
            .load_account(req.source_account)
            .await?
            .ok_or(BankError::AccountNotFound)?;
        if source.owner != sender {
            return Err(BankError::Forbidden);
        }
        if source.currency != req.currency {
            return Err(BankError::CurrencyMismatch {
                account: source.currency.as_str().into(),
                requested: req.currency.as_str().into(),
            });
        }

        let recipient = match &req.recipient {
            RecipientRef::Internal(id) => self.store.load_account(*id).await?,
            RecipientRef::External(iban) => self.store.load_account_by_iban(iban).await?,
        }
        .ok_or(BankError::RecipientNotFound)?;
        if recipient.id == source.id {
            return Err(BankError::SameAccount);
        }
        if recipient.currency != req.currency {
            return Err(BankError::CurrencyMismatch {
                account: recipient.currency.as_str().into(),
                requested: req.currency.as_str().into(),
            });
        }

        // Advisory only: the authoritative check happens inside the execute
        // unit. Nothing is reserved here.
        if !source.covers(req.amount) {
            return Err(BankError::InsufficientFunds);
        }

        let transfer_id = TransferId::new();
        let (challenge, code) = self.tan.issue(
            transfer_id,
            sender,
            req.amount,
            &req.recipient.to_string(),
            now,
        );
        let transfer = Transfer::pending_tan(
            transfer_id,
            sender,
            req.source_account,
            req.recipient.clone(),
            req.amount,
            req.currency,
            challenge.id,
            req.reference.clone(),
            now,
        );
        let challenge_id = challenge.id;
        let expires_in = (challenge.expires_at - now).num_seconds();

        self.store
            .run_atomic(|tx| {
                tx.put_transfer(transfer.clone());
                tx.put_challenge(challenge.clone());
                Ok(())
            })
            .await?;

        info!(
            transfer_id = %transfer_id,
            challenge_id = %challenge_id,
            sender = %sender,
            "Transfer initiated, TAN challenge issued"
        );

        Ok(InitiateReceipt {
            transfer_id,
            challenge_id,
            expires_in,
            mock_tan: self.tan.config().expose_raw_code.then_some(code),
        })
    }

    /// Phase two: verify the TAN and move the money, indivisibly.
    pub async fn execute(
        &self,
        user: UserId,
        req: ExecuteRequest,
    ) -> Result<ExecuteReceipt, BankError> {
        self.execute_at(user, req, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        user: UserId,
        req: ExecuteRequest,
        now: DateTime<Utc>,
    ) -> Result<ExecuteReceipt, BankError> {
        let outcome = self
            .store
            .run_atomic(|tx| execute_unit(tx, user, &req, now))
            .await?;

        match outcome {
            ExecuteOutcome::Executed(receipt) => {
                info!(transfer_id = %receipt.transfer_id, "Transfer executed");
                Ok(receipt)
            }
            ExecuteOutcome::Rejected(err) => {
                warn!(
                    transfer_id = %req.transfer_id,
                    code = err.code(),
                    "Transfer execution rejected"
                );
                Err(err)
            }
        }
    }

    /// Periodic expiry sweep, delegated to the TAN manager.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, BankError> {
        self.tan.sweep_expired(now).await
    }
}

/// The execute unit. Runs entirely inside one store transaction; every path
/// either commits a consistent state or aborts without a trace.
fn execute_unit(
    tx: &mut dyn LedgerTx,
    user: UserId,
    req: &ExecuteRequest,
    now: DateTime<Utc>,
) -> Result<ExecuteOutcome, BankError> {
    let mut transfer = tx
        .transfer(req.transfer_id)?
        .ok_or(BankError::TransferNotFound)?;
    if transfer.sender != user {
        return Err(BankError::Forbidden);
    }
    if transfer.status.is_terminal() {
        // Also what the loser of a concurrent execute race sees after the
        // store re-runs its unit.
        return Err(BankError::TransferNotFound);
    }

    let paired_id = transfer
        .challenge_id
        .ok_or_else(|| BankError::Internal("pending transfer without challenge".into()))?;
    if paired_id != req.challenge_id {
        return Err(BankError::ChallengeNotFound);
    }
    let mut challenge = tx
        .challenge(paired_id)?
        .ok_or(BankError::ChallengeNotFound)?;
    if challenge.user_id != user {
        // Session binding: only the initiating user may answer.
        return Err(BankError::Forbidden);
    }

    let verdict = challenge.evaluate(
        &req.code,
        transfer.amount,
        &transfer.recipient.to_string(),
        now,
    );
    match verdict {
        TanVerdict::WrongCode { remaining } => {
            // The burned attempt must survive the rejection: commit it.
            tx.put_challenge(challenge);
            Ok(ExecuteOutcome::Rejected(BankError::TanWrongCode {
                remaining,
            }))
        }
        TanVerdict::Expired => {
            // Explicit check drives the TanPending -> Expired transition.
            transfer.status.transition(TransferStatus::Expired)?;
            tx.put_transfer(transfer);
            Ok(ExecuteOutcome::Rejected(BankError::TanExpired))
        }
        TanVerdict::Exhausted => {
            // Challenge locks, transfer fails terminally: re-initiation only.
            tx.put_challenge(challenge);
            transfer.status.transition(TransferStatus::Failed)?;
            tx.put_transfer(transfer);
            Ok(ExecuteOutcome::Rejected(BankError::TanExhausted))
        }
        TanVerdict::AlreadyUsed => Err(BankError::TanExhausted),
        TanVerdict::LinkMismatch => Err(BankError::InvalidRequest(
            "transaction details do not match the challenge".into(),
        )),
        TanVerdict::Approved => {
            let receipt = apply_executed(tx, &mut transfer, now)?;
            // Consumption commits only together with the mutation above; an
            // abort on any earlier path leaves the TAN unconsumed.
            tx.put_challenge(challenge);
            tx.put_transfer(transfer);
            Ok(ExecuteOutcome::Executed(receipt))
        }
    }
}

/// Hard re-check and double-entry mutation. An `Err` from here aborts the
/// whole unit, TAN consumption included.
fn apply_executed(
    tx: &mut dyn LedgerTx,
    transfer: &mut Transfer,
    now: DateTime<Utc>,
) -> Result<ExecuteReceipt, BankError> {
    let mut source = tx
        .account(transfer.source_account)?
        .ok_or(BankError::AccountNotFound)?;
    let mut recipient = resolve_recipient(tx, &transfer.recipient)?;
    if recipient.id == source.id {
        return Err(BankError::SameAccount);
    }

    // Authoritative check on the in-transaction balance; the soft check at
    // initiate time proves nothing by now.
    if !source.covers(transfer.amount) {
        return Err(BankError::InsufficientFunds);
    }
    source.debit(transfer.amount)?;
    recipient.credit(transfer.amount)?;

    let (debit, credit) = LedgerEntry::pair(
        transfer.id,
        source.id,
        recipient.id,
        transfer.amount,
        transfer.recipient.to_string(),
        source.iban.to_string(),
        now,
    );

    tx.put_account(source);
    tx.put_account(recipient);
    tx.append_entry(debit);
    tx.append_entry(credit);

    transfer.status.transition(TransferStatus::Executed)?;
    transfer.executed_at = Some(now);

    Ok(ExecuteReceipt {
        transfer_id: transfer.id,
        executed_at: now,
    })
}

fn resolve_recipient(
    tx: &mut dyn LedgerTx,
    recipient: &RecipientRef,
) -> Result<Account, BankError> {
    match recipient {
        RecipientRef::Internal(id) => tx.account(*id)?,
        RecipientRef::External(iban) => tx.account_by_iban(iban)?,
    }
    .ok_or(BankError::RecipientNotFound)
}
