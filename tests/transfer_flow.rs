//! End-to-end properties of the transfer subsystem, driven through the
//! public service APIs against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use bankwerk::config::{SchedulerConfig, StoreConfig, TanConfig};
use bankwerk::ledger::store::LedgerTx;
use bankwerk::standing_order::{CreateOrderRequest, OrderStatus, RunOutcome, StandingOrderScheduler};
use bankwerk::transfer::{ExecuteRequest, InitiateRequest, PeerTransferService, TransferOrchestrator};
use bankwerk::{
    Account, AccountId, AccountKind, Amount, BankError, Currency, Frequency, Iban, MemoryStore,
    RecipientRef, TransactionalStore, TransferStatus, UserId,
};

struct Harness {
    store: Arc<MemoryStore>,
    orchestrator: TransferOrchestrator<MemoryStore>,
    p2p: PeerTransferService<MemoryStore>,
    scheduler: StandingOrderScheduler<MemoryStore>,
}

fn tan_config() -> TanConfig {
    TanConfig {
        length: 6,
        ttl_secs: 300,
        max_attempts: 3,
        expose_raw_code: true,
    }
}

fn harness() -> Harness {
    harness_with_scheduler(SchedulerConfig::default())
}

fn harness_with_scheduler(scheduler_config: SchedulerConfig) -> Harness {
    let store = Arc::new(MemoryStore::new(StoreConfig::default()));
    Harness {
        orchestrator: TransferOrchestrator::new(store.clone(), tan_config()),
        p2p: PeerTransferService::new(store.clone()),
        scheduler: StandingOrderScheduler::new(store.clone(), scheduler_config),
        store,
    }
}

/// Open an account with the given balance in euro cents.
async fn open_account(store: &MemoryStore, owner: i64, kind: AccountKind, minor: i64) -> Account {
    let mut account = {
        let mut rng = rand::thread_rng();
        Account::open(
            UserId(owner),
            kind,
            Currency::Eur,
            Iban::generate_de(&mut rng),
            Utc::now(),
        )
    };
    if minor > 0 {
        account.credit(Amount::from_minor(minor)).unwrap();
    }
    let stored = account.clone();
    store
        .run_atomic(move |tx| {
            tx.put_account(stored.clone());
            Ok(())
        })
        .await
        .unwrap();
    account
}

async fn balance_of(store: &MemoryStore, id: AccountId) -> Amount {
    store.load_account(id).await.unwrap().unwrap().balance()
}

fn eur(s: &str) -> Amount {
    Amount::parse(s, Currency::Eur).unwrap()
}

fn initiate_req(source: &Account, recipient: &Account, amount: &str) -> InitiateRequest {
    InitiateRequest {
        source_account: source.id,
        recipient: RecipientRef::Internal(recipient.id),
        amount: eur(amount),
        currency: Currency::Eur,
        reference: "Test".into(),
    }
}

// ============================================================================
// Two-phase flow
// ============================================================================

#[tokio::test]
async fn test_initiate_execute_moves_funds_and_balances_ledger() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 500_000).await;

    let receipt = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "200.00"))
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().expect("test config exposes the code");

    let executed = h
        .orchestrator
        .execute(
            UserId(1),
            ExecuteRequest {
                transfer_id: receipt.transfer_id,
                challenge_id: receipt.challenge_id,
                code: tan,
            },
        )
        .await
        .unwrap();
    assert_eq!(executed.transfer_id, receipt.transfer_id);

    assert_eq!(balance_of(&h.store, a.id).await, eur("1300.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("5200.00"));

    let transfer = h
        .store
        .load_transfer(receipt.transfer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Executed);
    assert!(transfer.executed_at.is_some());

    // Exactly one debit and one credit, summing to zero.
    let debits = h.store.load_entries_of(a.id, 10).await.unwrap();
    let credits = h.store.load_entries_of(b.id, 10).await.unwrap();
    assert_eq!(debits.len(), 1);
    assert_eq!(credits.len(), 1);
    assert_eq!(debits[0].amount, eur("200.00").negated());
    assert_eq!(credits[0].amount, eur("200.00"));
    assert_eq!(debits[0].related_transfer_id, receipt.transfer_id);
    assert_eq!(credits[0].related_transfer_id, receipt.transfer_id);
}

#[tokio::test]
async fn test_initiate_rejects_zero_amount() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let result = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "0.00"))
        .await;
    assert_eq!(result.unwrap_err(), BankError::InvalidAmount);

    // Nothing persisted: no ledger movement on either side.
    assert!(h.store.load_entries_of(a.id, 10).await.unwrap().is_empty());
    assert_eq!(balance_of(&h.store, a.id).await, eur("1500.00"));
}

#[tokio::test]
async fn test_initiate_validation_short_circuits() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    // Foreign source account.
    let result = h
        .orchestrator
        .initiate(UserId(2), initiate_req(&a, &b, "10.00"))
        .await;
    assert_eq!(result.unwrap_err(), BankError::Forbidden);

    // Unknown recipient.
    let mut req = initiate_req(&a, &b, "10.00");
    req.recipient = RecipientRef::Internal(AccountId::new());
    assert_eq!(
        h.orchestrator.initiate(UserId(1), req).await.unwrap_err(),
        BankError::RecipientNotFound
    );

    // Transfer to itself.
    let mut req = initiate_req(&a, &b, "10.00");
    req.recipient = RecipientRef::Internal(a.id);
    assert_eq!(
        h.orchestrator.initiate(UserId(1), req).await.unwrap_err(),
        BankError::SameAccount
    );

    // Soft check: clearly more than the balance.
    assert_eq!(
        h.orchestrator
            .initiate(UserId(1), initiate_req(&a, &b, "99999.00"))
            .await
            .unwrap_err(),
        BankError::InsufficientFunds
    );
}

#[tokio::test]
async fn test_wrong_code_burns_attempts_then_correct_code_executes() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let receipt = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "50.00"))
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().unwrap();
    let wrong = if tan == "000000" { "111111" } else { "000000" };

    let req = |code: &str| ExecuteRequest {
        transfer_id: receipt.transfer_id,
        challenge_id: receipt.challenge_id,
        code: code.into(),
    };

    // The attempt decrement persists across calls even though the transfer
    // itself stays pending.
    assert_eq!(
        h.orchestrator.execute(UserId(1), req(wrong)).await.unwrap_err(),
        BankError::TanWrongCode { remaining: 2 }
    );
    assert_eq!(
        h.orchestrator.execute(UserId(1), req(wrong)).await.unwrap_err(),
        BankError::TanWrongCode { remaining: 1 }
    );

    let transfer = h.store.load_transfer(receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::TanPending);
    assert_eq!(balance_of(&h.store, a.id).await, eur("1500.00"));

    h.orchestrator.execute(UserId(1), req(&tan)).await.unwrap();
    assert_eq!(balance_of(&h.store, a.id).await, eur("1450.00"));
}

#[tokio::test]
async fn test_exhausted_attempts_fail_terminally_even_with_correct_code() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let receipt = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "50.00"))
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().unwrap();
    let wrong = if tan == "000000" { "111111" } else { "000000" };

    let req = |code: &str| ExecuteRequest {
        transfer_id: receipt.transfer_id,
        challenge_id: receipt.challenge_id,
        code: code.into(),
    };

    for remaining in [2, 1, 0] {
        assert_eq!(
            h.orchestrator.execute(UserId(1), req(wrong)).await.unwrap_err(),
            BankError::TanWrongCode { remaining }
        );
    }

    // Budget gone: the correct code is rejected and the transfer fails.
    assert_eq!(
        h.orchestrator.execute(UserId(1), req(&tan)).await.unwrap_err(),
        BankError::TanExhausted
    );
    let transfer = h.store.load_transfer(receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Failed);

    // Terminal transfers reject further attempts outright.
    assert_eq!(
        h.orchestrator.execute(UserId(1), req(&tan)).await.unwrap_err(),
        BankError::TransferNotFound
    );
    assert_eq!(balance_of(&h.store, a.id).await, eur("1500.00"));
}

#[tokio::test]
async fn test_expired_tan_rejected_regardless_of_code() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let t0 = Utc::now();
    let receipt = h
        .orchestrator
        .initiate_at(UserId(1), initiate_req(&a, &b, "50.00"), t0)
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().unwrap();

    let after_expiry = t0 + Duration::seconds(tan_config().ttl_secs + 1);
    let result = h
        .orchestrator
        .execute_at(
            UserId(1),
            ExecuteRequest {
                transfer_id: receipt.transfer_id,
                challenge_id: receipt.challenge_id,
                code: tan,
            },
            after_expiry,
        )
        .await;
    assert_eq!(result.unwrap_err(), BankError::TanExpired);

    // The explicit check drove the transition to Expired.
    let transfer = h.store.load_transfer(receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Expired);
    assert_eq!(balance_of(&h.store, a.id).await, eur("1500.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("0.00"));
}

#[tokio::test]
async fn test_sweep_expires_pending_transfers() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let t0 = Utc::now();
    let receipt = h
        .orchestrator
        .initiate_at(UserId(1), initiate_req(&a, &b, "50.00"), t0)
        .await
        .unwrap();

    let after_expiry = t0 + Duration::seconds(tan_config().ttl_secs + 1);
    assert_eq!(h.orchestrator.sweep_expired(after_expiry).await.unwrap(), 1);
    // Idempotent: nothing left to sweep.
    assert_eq!(h.orchestrator.sweep_expired(after_expiry).await.unwrap(), 0);

    let transfer = h.store.load_transfer(receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Expired);
}

#[tokio::test]
async fn test_insufficient_funds_at_execute_aborts_without_consuming_tan() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 30_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;
    open_account(&h.store, 3, AccountKind::Checking, 0).await;

    // Soft check passes: 300.00 covers 200.00.
    let receipt = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "200.00"))
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().unwrap();

    // Balance drains between initiate and execute.
    h.p2p
        .transfer(UserId(1), UserId(3), eur("150.00"), Currency::Eur, "weg".into())
        .await
        .unwrap();
    assert_eq!(balance_of(&h.store, a.id).await, eur("150.00"));

    let req = ExecuteRequest {
        transfer_id: receipt.transfer_id,
        challenge_id: receipt.challenge_id,
        code: tan.clone(),
    };
    // Hard check fails; the whole unit aborts.
    assert_eq!(
        h.orchestrator.execute(UserId(1), req.clone()).await.unwrap_err(),
        BankError::InsufficientFunds
    );
    assert_eq!(balance_of(&h.store, a.id).await, eur("150.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("0.00"));
    let transfer = h.store.load_transfer(receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::TanPending);

    // The TAN survived the abort: top the account back up and the same
    // challenge still executes.
    let top_up = a.id;
    h.store
        .run_atomic(move |tx| {
            let mut acc = tx.account(top_up)?.ok_or(BankError::AccountNotFound)?;
            acc.credit(Amount::from_minor(10_000))?;
            tx.put_account(acc);
            Ok(())
        })
        .await
        .unwrap();

    h.orchestrator.execute(UserId(1), req).await.unwrap();
    assert_eq!(balance_of(&h.store, a.id).await, eur("50.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("200.00"));
}

#[tokio::test]
async fn test_concurrent_execute_yields_exactly_one_success() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let receipt = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "200.00"))
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().unwrap();

    let req = ExecuteRequest {
        transfer_id: receipt.transfer_id,
        challenge_id: receipt.challenge_id,
        code: tan,
    };
    let (r1, r2) = tokio::join!(
        h.orchestrator.execute(UserId(1), req.clone()),
        h.orchestrator.execute(UserId(1), req.clone()),
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one winner: {r1:?} / {r2:?}");

    // Applied exactly once.
    assert_eq!(balance_of(&h.store, a.id).await, eur("1300.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("200.00"));
    assert_eq!(h.store.load_entries_of(a.id, 10).await.unwrap().len(), 1);
    assert_eq!(h.store.load_entries_of(b.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_session_binding_rejects_foreign_caller() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 150_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let receipt = h
        .orchestrator
        .initiate(UserId(1), initiate_req(&a, &b, "50.00"))
        .await
        .unwrap();
    let tan = receipt.mock_tan.clone().unwrap();

    // User 2 knows the code but did not initiate the transfer.
    let result = h
        .orchestrator
        .execute(
            UserId(2),
            ExecuteRequest {
                transfer_id: receipt.transfer_id,
                challenge_id: receipt.challenge_id,
                code: tan,
            },
        )
        .await;
    assert_eq!(result.unwrap_err(), BankError::Forbidden);
    assert_eq!(balance_of(&h.store, a.id).await, eur("1500.00"));
}

// ============================================================================
// P2P path
// ============================================================================

#[tokio::test]
async fn test_p2p_transfer_between_checking_accounts() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 10_000).await;
    // Savings accounts never settle P2P transfers.
    open_account(&h.store, 1, AccountKind::Savings, 99_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let receipt = h
        .p2p
        .transfer(UserId(1), UserId(2), eur("25.00"), Currency::Eur, "Danke!".into())
        .await
        .unwrap();

    assert_eq!(balance_of(&h.store, a.id).await, eur("75.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("25.00"));

    let transfer = h.store.load_transfer(receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Executed);
    assert!(transfer.challenge_id.is_none());

    let sent = h.store.load_entries_of(a.id, 10).await.unwrap();
    let received = h.store.load_entries_of(b.id, 10).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(received.len(), 1);
    assert_eq!(sent[0].amount.checked_add(received[0].amount).unwrap(), Amount::ZERO);
}

#[tokio::test]
async fn test_p2p_hard_check_and_validation() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 1_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    assert_eq!(
        h.p2p
            .transfer(UserId(1), UserId(2), eur("10.01"), Currency::Eur, String::new())
            .await
            .unwrap_err(),
        BankError::InsufficientFunds
    );
    assert_eq!(
        h.p2p
            .transfer(UserId(1), UserId(1), eur("1.00"), Currency::Eur, String::new())
            .await
            .unwrap_err(),
        BankError::SameAccount
    );
    assert_eq!(
        h.p2p
            .transfer(UserId(1), UserId(9), eur("1.00"), Currency::Eur, String::new())
            .await
            .unwrap_err(),
        BankError::AccountNotFound
    );
    assert_eq!(
        h.p2p
            .transfer(UserId(1), UserId(2), Amount::ZERO, Currency::Eur, String::new())
            .await
            .unwrap_err(),
        BankError::InvalidAmount
    );

    // Nothing moved on any failure path.
    assert_eq!(balance_of(&h.store, a.id).await, eur("10.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("0.00"));
}

// ============================================================================
// Standing orders
// ============================================================================

fn order_req(source: &Account, recipient: &Account, amount: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        source_account: source.id,
        recipient: RecipientRef::Internal(recipient.id),
        amount: eur(amount),
        currency: Currency::Eur,
        reference: "Miete".into(),
        frequency: Frequency::Monthly,
        execution_day: 1,
        start_at: Utc::now() - Duration::hours(1),
        end_date: None,
    }
}

#[tokio::test]
async fn test_scheduler_pass_is_idempotent_per_due_date() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 100_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    h.scheduler
        .create(UserId(1), order_req(&a, &b, "300.00"))
        .await
        .unwrap();

    let now = Utc::now();
    let first = h.scheduler.run_pass(now).await.unwrap();
    assert_eq!(first.executed, 1);

    // Immediate second pass: the advanced next_run_at gates the order out.
    let second = h.scheduler.run_pass(now).await.unwrap();
    assert_eq!(second.executed, 0);
    assert_eq!(second.failed, 0);

    assert_eq!(balance_of(&h.store, a.id).await, eur("700.00"));
    assert_eq!(balance_of(&h.store, b.id).await, eur("300.00"));

    let orders = h.scheduler.list(UserId(1)).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(orders[0].last_executed_transfer_id.is_some());
    assert!(orders[0].next_run_at > now);
}

#[tokio::test]
async fn test_run_due_skips_after_advance() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 100_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let order_id = h
        .scheduler
        .create(UserId(1), order_req(&a, &b, "300.00"))
        .await
        .unwrap();

    let now = Utc::now();
    let first = h.scheduler.run_due(order_id, now).await.unwrap();
    assert!(matches!(first, RunOutcome::Executed(_)));
    let second = h.scheduler.run_due(order_id, now).await.unwrap();
    assert_eq!(second, RunOutcome::Skipped);

    assert_eq!(balance_of(&h.store, b.id).await, eur("300.00"));
}

#[tokio::test]
async fn test_failed_run_leaves_schedule_for_retry() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 10_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let order_id = h
        .scheduler
        .create(UserId(1), order_req(&a, &b, "300.00"))
        .await
        .unwrap();

    let now = Utc::now();
    let summary = h.scheduler.run_pass(now).await.unwrap();
    assert_eq!(summary.failed, 1);

    let orders = h.scheduler.list(UserId(1)).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Active);
    assert_eq!(orders[0].consecutive_failures, 1);
    assert!(orders[0].last_executed_transfer_id.is_none());

    // Still due: funds arrive, the retry succeeds.
    let top_up = a.id;
    h.store
        .run_atomic(move |tx| {
            let mut acc = tx.account(top_up)?.ok_or(BankError::AccountNotFound)?;
            acc.credit(Amount::from_minor(50_000))?;
            tx.put_account(acc);
            Ok(())
        })
        .await
        .unwrap();
    let outcome = h.scheduler.run_due(order_id, now).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Executed(_)));
    assert_eq!(balance_of(&h.store, b.id).await, eur("300.00"));

    let orders = h.scheduler.list(UserId(1)).await.unwrap();
    assert_eq!(orders[0].consecutive_failures, 0);
}

#[tokio::test]
async fn test_suspension_after_consecutive_failures() {
    let h = harness_with_scheduler(SchedulerConfig {
        interval_secs: 60,
        suspend_after_failures: Some(2),
    });
    let a = open_account(&h.store, 1, AccountKind::Checking, 1_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let order_id = h
        .scheduler
        .create(UserId(1), order_req(&a, &b, "300.00"))
        .await
        .unwrap();

    let now = Utc::now();
    assert!(matches!(
        h.scheduler.run_due(order_id, now).await.unwrap(),
        RunOutcome::Failed(BankError::InsufficientFunds)
    ));
    assert!(matches!(
        h.scheduler.run_due(order_id, now).await.unwrap(),
        RunOutcome::Failed(BankError::InsufficientFunds)
    ));

    let orders = h.scheduler.list(UserId(1)).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Suspended);

    // Suspended orders are no longer due.
    assert!(h.scheduler.list_due(now).await.unwrap().is_empty());
    assert_eq!(h.scheduler.run_due(order_id, now).await.unwrap(), RunOutcome::Skipped);
}

#[tokio::test]
async fn test_cancel_enforces_ownership() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 100_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let order_id = h
        .scheduler
        .create(UserId(1), order_req(&a, &b, "300.00"))
        .await
        .unwrap();

    assert_eq!(
        h.scheduler.cancel(order_id, UserId(2)).await.unwrap_err(),
        BankError::Forbidden
    );
    h.scheduler.cancel(order_id, UserId(1)).await.unwrap();

    let orders = h.scheduler.list(UserId(1)).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Cancelled);
    assert!(h.scheduler.list_due(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_order_completes_past_end_date() {
    let h = harness();
    let a = open_account(&h.store, 1, AccountKind::Checking, 100_000).await;
    let b = open_account(&h.store, 2, AccountKind::Checking, 0).await;

    let mut req = order_req(&a, &b, "100.00");
    // One run left: the next advance always lands past the end date.
    req.end_date = Some(Utc::now() + Duration::hours(1));
    let order_id = h.scheduler.create(UserId(1), req).await.unwrap();

    let outcome = h.scheduler.run_due(order_id, Utc::now()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Executed(_)));

    let orders = h.scheduler.list(UserId(1)).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Completed);
    assert_eq!(balance_of(&h.store, b.id).await, eur("100.00"));
}
