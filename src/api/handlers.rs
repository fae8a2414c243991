//! HTTP handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, ChallengeId, OrderId, TransferId, UserId};
use crate::error::BankError;
use crate::iban::Iban;
use crate::ledger::model::{Account, AccountKind, LedgerEntry};
use crate::ledger::store::TransactionalStore;
use crate::money::{Amount, Currency};
use crate::standing_order::{CreateOrderRequest, Frequency, StandingOrder};
use crate::transfer::{
    ExecuteReceipt, ExecuteRequest, InitiateReceipt, InitiateRequest, RecipientRef,
};

use super::{ApiError, ApiResponse, AppState};

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    pub version: &'static str,
    pub git: &'static str,
}

pub async fn health() -> Json<ApiResponse<HealthInfo>> {
    Json(ApiResponse::success(HealthInfo {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        git: env!("GIT_HASH"),
    }))
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AccountInfo {
    pub id: String,
    pub kind: &'static str,
    pub balance: String,
    pub currency: &'static str,
    pub iban: String,
}

impl AccountInfo {
    fn from_account(acc: &Account) -> Self {
        Self {
            id: acc.id.to_string(),
            kind: acc.kind.as_str(),
            balance: acc.balance().format(acc.currency),
            currency: acc.currency.as_str(),
            iban: acc.iban.formatted(),
        }
    }
}

/// Create the caller's initial Checking + Savings account pair.
pub async fn signup<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<AccountInfo>>>, ApiError> {
    let user = state.authenticate(&headers).await?;

    let now = Utc::now();
    let accounts = {
        // thread_rng is not Send; keep it out of the await below.
        let mut rng = rand::thread_rng();
        vec![
            Account::open(user, AccountKind::Checking, Currency::Eur, Iban::generate_de(&mut rng), now),
            Account::open(user, AccountKind::Savings, Currency::Eur, Iban::generate_de(&mut rng), now),
        ]
    };

    let to_store = accounts.clone();
    state
        .store
        .run_atomic(move |tx| {
            if tx.checking_account_of(user)?.is_some() {
                return Err(BankError::InvalidRequest("user already initialized".into()));
            }
            for acc in &to_store {
                tx.put_account(acc.clone());
            }
            Ok(())
        })
        .await?;

    Ok(Json(ApiResponse::success(
        accounts.iter().map(AccountInfo::from_account).collect(),
    )))
}

#[derive(Debug, Serialize)]
pub struct EntryInfo {
    pub id: String,
    pub account_id: String,
    pub direction: &'static str,
    pub amount: String,
    pub counterparty: String,
    pub transfer_id: String,
    pub created_at: DateTime<Utc>,
}

impl EntryInfo {
    fn from_entry(entry: &LedgerEntry, currency: Currency) -> Self {
        Self {
            id: entry.id.to_string(),
            account_id: entry.account_id.to_string(),
            direction: entry.direction.as_str(),
            amount: entry.amount.format(currency),
            counterparty: entry.counterparty.clone(),
            transfer_id: entry.related_transfer_id.to_string(),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardInfo {
    pub accounts: Vec<AccountInfo>,
    pub total_balance: String,
    pub recent_entries: Vec<EntryInfo>,
}

pub async fn dashboard<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<DashboardInfo>>, ApiError> {
    let user = state.authenticate(&headers).await?;
    let accounts = state.store.load_accounts_of(user).await?;

    let mut total = Amount::ZERO;
    let mut entries = Vec::new();
    for acc in &accounts {
        total = total.checked_add(acc.balance())?;
        for entry in state.store.load_entries_of(acc.id, 10).await? {
            entries.push(EntryInfo::from_entry(&entry, acc.currency));
        }
    }
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries.truncate(10);

    Ok(Json(ApiResponse::success(DashboardInfo {
        accounts: accounts.iter().map(AccountInfo::from_account).collect(),
        total_balance: total.format(Currency::Eur),
        recent_entries: entries,
    })))
}

// ============================================================================
// Two-phase transfer
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InitiateTransferBody {
    pub from_account_id: String,
    /// Internal recipient, addressed by account id.
    pub to_account_id: Option<String>,
    /// External recipient, addressed by IBAN.
    pub recipient_iban: Option<String>,
    /// Amount as string (to avoid float precision issues)
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub reference: String,
}

fn parse_recipient(
    to_account_id: &Option<String>,
    recipient_iban: &Option<String>,
) -> Result<RecipientRef, BankError> {
    match (to_account_id, recipient_iban) {
        (Some(id), _) => Ok(RecipientRef::Internal(
            AccountId::from_str(id)
                .map_err(|_| BankError::InvalidRequest(format!("invalid account id: {id}")))?,
        )),
        (None, Some(iban)) => Ok(RecipientRef::External(Iban::parse(iban)?)),
        (None, None) => Err(BankError::InvalidRequest(
            "either to_account_id or recipient_iban is required".into(),
        )),
    }
}

pub async fn initiate_transfer<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<InitiateTransferBody>,
) -> Result<Json<ApiResponse<InitiateReceipt>>, ApiError> {
    let user = state.authenticate(&headers).await?;

    let currency = Currency::parse(&body.currency)?;
    let req = InitiateRequest {
        source_account: AccountId::from_str(&body.from_account_id).map_err(|_| {
            BankError::InvalidRequest(format!("invalid account id: {}", body.from_account_id))
        })?,
        recipient: parse_recipient(&body.to_account_id, &body.recipient_iban)?,
        amount: Amount::parse(&body.amount, currency)?,
        currency,
        reference: body.reference,
    };

    let receipt = state.orchestrator.initiate(user, req).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmTransferBody {
    pub transfer_id: String,
    pub challenge_id: String,
    pub tan: String,
}

pub async fn confirm_transfer<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<ConfirmTransferBody>,
) -> Result<Json<ApiResponse<ExecuteReceipt>>, ApiError> {
    let user = state.authenticate(&headers).await?;

    let req = ExecuteRequest {
        transfer_id: TransferId::from_str(&body.transfer_id)
            .map_err(|_| BankError::TransferNotFound)?,
        challenge_id: ChallengeId::from_str(&body.challenge_id)
            .map_err(|_| BankError::ChallengeNotFound)?,
        code: body.tan,
    };

    let receipt = state.orchestrator.execute(user, req).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

// ============================================================================
// P2P transfer
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PeerTransferBody {
    pub recipient_user_id: i64,
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub message: String,
}

pub async fn peer_transfer<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<PeerTransferBody>,
) -> Result<Json<ApiResponse<ExecuteReceipt>>, ApiError> {
    let user = state.authenticate(&headers).await?;

    let currency = Currency::parse(&body.currency)?;
    let amount = Amount::parse(&body.amount, currency)?;
    let receipt = state
        .p2p
        .transfer(user, UserId(body.recipient_user_id), amount, currency, body.message)
        .await?;
    Ok(Json(ApiResponse::success(receipt)))
}

// ============================================================================
// Standing orders
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OrderInfo {
    pub id: String,
    pub source_account_id: String,
    pub recipient: String,
    pub amount: String,
    pub currency: &'static str,
    pub reference: String,
    pub frequency: &'static str,
    pub next_run_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: &'static str,
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl OrderInfo {
    fn from_order(order: &StandingOrder) -> Self {
        Self {
            id: order.id.to_string(),
            source_account_id: order.source_account.to_string(),
            recipient: order.recipient.to_string(),
            amount: order.amount.format(order.currency),
            currency: order.currency.as_str(),
            reference: order.reference.clone(),
            frequency: order.frequency.as_str(),
            next_run_at: order.next_run_at,
            end_date: order.end_date,
            status: order.status.as_str(),
            last_executed_at: order.last_executed_at,
        }
    }
}

pub async fn list_standing_orders<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<OrderInfo>>>, ApiError> {
    let user = state.authenticate(&headers).await?;
    let orders = state.scheduler.list(user).await?;
    Ok(Json(ApiResponse::success(
        orders.iter().map(OrderInfo::from_order).collect(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub from_account_id: String,
    pub to_account_id: Option<String>,
    pub recipient_iban: Option<String>,
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub reference: String,
    pub frequency: String,
    #[serde(default = "default_execution_day")]
    pub execution_day: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

fn default_execution_day() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct OrderCreated {
    pub order_id: String,
}

pub async fn create_standing_order<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<ApiResponse<OrderCreated>>, ApiError> {
    let user = state.authenticate(&headers).await?;

    let currency = Currency::parse(&body.currency)?;
    let req = CreateOrderRequest {
        source_account: AccountId::from_str(&body.from_account_id).map_err(|_| {
            BankError::InvalidRequest(format!("invalid account id: {}", body.from_account_id))
        })?,
        recipient: parse_recipient(&body.to_account_id, &body.recipient_iban)?,
        amount: Amount::parse(&body.amount, currency)?,
        currency,
        reference: body.reference,
        frequency: Frequency::parse(&body.frequency)?,
        execution_day: body.execution_day,
        start_at: body.start_date,
        end_date: body.end_date,
    };

    let order_id = state.scheduler.create(user, req).await?;
    Ok(Json(ApiResponse::success(OrderCreated {
        order_id: order_id.to_string(),
    })))
}

#[derive(Debug, Serialize)]
pub struct Cancelled {
    pub cancelled: bool,
}

pub async fn cancel_standing_order<S: TransactionalStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Cancelled>>, ApiError> {
    let user = state.authenticate(&headers).await?;
    let order_id = OrderId::from_str(&order_id).map_err(|_| BankError::OrderNotFound)?;
    state.scheduler.cancel(order_id, user).await?;
    Ok(Json(ApiResponse::success(Cancelled { cancelled: true })))
}
