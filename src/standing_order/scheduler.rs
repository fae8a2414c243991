//! Standing Order Scheduler
//!
//! Periodic job that executes due orders through the same atomic primitive as
//! the peer transfer path. Advancing `next_run_at` inside the execution unit
//! is the idempotency gate: a second pass over the same due date sees the
//! order as not-yet-due and skips it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::core_types::{AccountId, OrderId, TransferId, UserId};
use crate::error::BankError;
use crate::ledger::model::{Account, LedgerEntry};
use crate::ledger::store::{LedgerTx, TransactionalStore};
use crate::money::{Amount, Currency};
use crate::transfer::{RecipientRef, Transfer};

use super::{Frequency, OrderStatus, StandingOrder, next_run_after};

/// Parameters for creating a standing order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub source_account: AccountId,
    pub recipient: RecipientRef,
    pub amount: Amount,
    pub currency: Currency,
    pub reference: String,
    pub frequency: Frequency,
    pub execution_day: u32,
    pub start_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Result of one `run_due` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Executed(TransferId),
    /// Not due (anymore) — another pass already advanced it, or the order
    /// left the Active state.
    Skipped,
    /// Execution failed; `next_run_at` untouched, order retried next pass.
    Failed(BankError),
}

/// Counters for one scheduler pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct StandingOrderScheduler<S> {
    store: Arc<S>,
    config: SchedulerConfig,
}

impl<S: TransactionalStore> StandingOrderScheduler<S> {
    pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub async fn create(
        &self,
        owner: UserId,
        req: CreateOrderRequest,
    ) -> Result<OrderId, BankError> {
        self.create_at(owner, req, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        owner: UserId,
        req: CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderId, BankError> {
        if !req.amount.is_positive() {
            return Err(BankError::InvalidAmount);
        }
        if !(1..=31).contains(&req.execution_day) {
            return Err(BankError::InvalidRequest(format!(
                "invalid execution day: {}",
                req.execution_day
            )));
        }
        if matches!(req.recipient, RecipientRef::Internal(id) if id == req.source_account) {
            return Err(BankError::SameAccount);
        }

        let source = self
            .store
            .load_account(req.source_account)
            .await?
            .ok_or(BankError::AccountNotFound)?;
        if source.owner != owner {
            return Err(BankError::Forbidden);
        }
        if source.currency != req.currency {
            return Err(BankError::CurrencyMismatch {
                account: source.currency.as_str().into(),
                requested: req.currency.as_str().into(),
            });
        }

        let order = StandingOrder {
            id: OrderId::new(),
            owner,
            source_account: req.source_account,
            recipient: req.recipient,
            amount: req.amount,
            currency: req.currency,
            reference: req.reference,
            frequency: req.frequency,
            execution_day: req.execution_day,
            next_run_at: req.start_at,
            end_date: req.end_date,
            status: OrderStatus::Active,
            last_executed_transfer_id: None,
            last_executed_at: None,
            consecutive_failures: 0,
            created_at: now,
        };
        let order_id = order.id;

        self.store
            .run_atomic(|tx| {
                tx.put_standing_order(order.clone());
                Ok(())
            })
            .await?;

        info!(order_id = %order_id, owner = %owner, "Standing order created");
        Ok(order_id)
    }

    pub async fn list(&self, owner: UserId) -> Result<Vec<StandingOrder>, BankError> {
        self.store.load_orders_of(owner).await
    }

    pub async fn cancel(&self, order_id: OrderId, owner: UserId) -> Result<(), BankError> {
        self.store
            .run_atomic(|tx| {
                let mut order = tx
                    .standing_order(order_id)?
                    .ok_or(BankError::OrderNotFound)?;
                if order.owner != owner {
                    return Err(BankError::Forbidden);
                }
                order.cancel()?;
                tx.put_standing_order(order);
                Ok(())
            })
            .await?;
        info!(order_id = %order_id, "Standing order cancelled");
        Ok(())
    }

    /// Active orders due at `now`. Advisory snapshot; `run_due` re-checks
    /// inside its unit.
    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<StandingOrder>, BankError> {
        self.store.due_orders(now).await
    }

    /// Execute one due order. Success advances `next_run_at` in the same
    /// unit as the mutation; failure leaves it unchanged (at-least-once per
    /// due date) and only bumps the failure counter.
    pub async fn run_due(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, BankError> {
        let suspend_after = self.config.suspend_after_failures;
        let outcome = self
            .store
            .run_atomic(|tx| run_unit(tx, order_id, suspend_after, now))
            .await?;

        match &outcome {
            RunOutcome::Executed(transfer_id) => {
                info!(order_id = %order_id, transfer_id = %transfer_id, "Standing order executed");
            }
            RunOutcome::Skipped => {}
            RunOutcome::Failed(err) => {
                warn!(order_id = %order_id, code = err.code(), "Standing order run failed");
            }
        }
        Ok(outcome)
    }

    /// One scheduler pass over everything due.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassSummary, BankError> {
        let due = self.list_due(now).await?;
        let mut summary = PassSummary::default();
        for order in due {
            match self.run_due(order.id, now).await {
                Ok(RunOutcome::Executed(_)) => summary.executed += 1,
                Ok(RunOutcome::Skipped) => summary.skipped += 1,
                Ok(RunOutcome::Failed(_)) => summary.failed += 1,
                Err(err) => {
                    warn!(order_id = %order.id, error = %err, "Standing order run errored");
                    summary.failed += 1;
                }
            }
        }
        if summary.executed + summary.failed > 0 {
            info!(
                executed = summary.executed,
                failed = summary.failed,
                skipped = summary.skipped,
                "Standing order pass complete"
            );
        }
        Ok(summary)
    }
}

/// The run unit: idempotency gate, then either the full mutation plus the
/// schedule advance, or failure bookkeeping. Both branches commit; only
/// store-level errors abort.
fn run_unit(
    tx: &mut dyn LedgerTx,
    order_id: OrderId,
    suspend_after: Option<u32>,
    now: DateTime<Utc>,
) -> Result<RunOutcome, BankError> {
    let mut order = tx
        .standing_order(order_id)?
        .ok_or(BankError::OrderNotFound)?;
    if !order.is_due(now) {
        return Ok(RunOutcome::Skipped);
    }

    match try_execute(tx, &order, now) {
        Ok(transfer_id) => {
            order.next_run_at = next_run_after(order.next_run_at, order.frequency, order.execution_day);
            order.last_executed_transfer_id = Some(transfer_id);
            order.last_executed_at = Some(now);
            order.consecutive_failures = 0;
            if order.end_date.is_some_and(|end| order.next_run_at > end) {
                order.status = OrderStatus::Completed;
            }
            tx.put_standing_order(order);
            Ok(RunOutcome::Executed(transfer_id))
        }
        Err(err) => {
            order.consecutive_failures += 1;
            if suspend_after.is_some_and(|limit| order.consecutive_failures >= limit) {
                order.status = OrderStatus::Suspended;
                warn!(
                    order_id = %order.id,
                    failures = order.consecutive_failures,
                    "Standing order suspended after repeated failures"
                );
            }
            tx.put_standing_order(order);
            Ok(RunOutcome::Failed(err))
        }
    }
}

/// The same mutation shape as the peer path: resolve, hard-check, debit,
/// credit, transfer record, entry pair.
fn try_execute(
    tx: &mut dyn LedgerTx,
    order: &StandingOrder,
    now: DateTime<Utc>,
) -> Result<TransferId, BankError> {
    let mut source = tx
        .account(order.source_account)?
        .ok_or(BankError::AccountNotFound)?;
    let mut recipient: Account = match &order.recipient {
        RecipientRef::Internal(id) => tx.account(*id)?,
        RecipientRef::External(iban) => tx.account_by_iban(iban)?,
    }
    .ok_or(BankError::RecipientNotFound)?;
    if recipient.id == source.id {
        return Err(BankError::SameAccount);
    }

    if !source.covers(order.amount) {
        return Err(BankError::InsufficientFunds);
    }
    source.debit(order.amount)?;
    recipient.credit(order.amount)?;

    let transfer = Transfer::executed_single_phase(
        order.owner,
        source.id,
        order.recipient.clone(),
        order.amount,
        order.currency,
        order.reference.clone(),
        now,
    );
    let (debit, credit) = LedgerEntry::pair(
        transfer.id,
        source.id,
        recipient.id,
        order.amount,
        order.recipient.to_string(),
        source.iban.to_string(),
        now,
    );
    let transfer_id = transfer.id;

    tx.put_account(source);
    tx.put_account(recipient);
    tx.put_transfer(transfer);
    tx.append_entry(debit);
    tx.append_entry(credit);
    Ok(transfer_id)
}
