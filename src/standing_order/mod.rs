//! Standing Orders (Dauerauftrag)
//!
//! Recurring, pre-authorized transfers executed on schedule without a
//! per-occurrence TAN. The scheduler owns `next_run_at` advancement and
//! failure bookkeeping; the owner may only cancel.

pub mod scheduler;

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, OrderId, TransferId, UserId};
use crate::error::BankError;
use crate::money::{Amount, Currency};
use crate::transfer::RecipientRef;

pub use scheduler::{CreateOrderRequest, PassSummary, RunOutcome, StandingOrderScheduler};

/// How often an order runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Result<Self, BankError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(BankError::InvalidRequest(format!(
                "invalid frequency: {other}"
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Standing order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Cancelled,
    /// End date reached.
    Completed,
    /// Too many consecutive failures (configurable policy).
    Suspended,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "ACTIVE",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Suspended => "SUSPENDED",
        }
    }
}

/// A recurring transfer definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingOrder {
    pub id: OrderId,
    pub owner: UserId,
    pub source_account: AccountId,
    pub recipient: RecipientRef,
    pub amount: Amount,
    pub currency: Currency,
    pub reference: String,
    pub frequency: Frequency,
    /// Day of month for monthly/quarterly/yearly orders, clamped to the
    /// target month's length.
    pub execution_day: u32,
    pub next_run_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub last_executed_transfer_id: Option<TransferId>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
}

impl StandingOrder {
    /// Whether the scheduler should pick this order up at `now`. This is also
    /// the idempotency gate: once `next_run_at` advances past `now`, a second
    /// pass skips the order.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Active && self.next_run_at <= now
    }

    /// Owner cancellation. Completed or already-cancelled orders stay as
    /// they are.
    pub fn cancel(&mut self) -> Result<(), BankError> {
        match self.status {
            OrderStatus::Active | OrderStatus::Suspended => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
            other => Err(BankError::InvalidStateTransition(format!(
                "{} -> CANCELLED",
                other.as_str()
            ))),
        }
    }
}

/// Compute the run following `current` for the given frequency.
///
/// Month-based frequencies land on `execution_day`, clamped to the target
/// month (Jan 31 -> Feb 28). The time of day is preserved.
pub fn next_run_after(
    current: DateTime<Utc>,
    frequency: Frequency,
    execution_day: u32,
) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => current + Duration::days(1),
        Frequency::Weekly => current + Duration::days(7),
        Frequency::Monthly => add_months(current, 1, execution_day),
        Frequency::Quarterly => add_months(current, 3, execution_day),
        Frequency::Yearly => add_months(current, 12, execution_day),
    }
}

fn add_months(current: DateTime<Utc>, months: u32, execution_day: u32) -> DateTime<Utc> {
    let total = current.year() * 12 + current.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = execution_day.clamp(1, days_in_month(year, month));
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| current.date_naive())
        .and_time(current.time());
    DateTime::from_naive_utc_and_offset(date, Utc)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
