//! Transfer record and request types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, ChallengeId, TransferId, UserId};
use crate::iban::Iban;
use crate::money::{Amount, Currency};

use super::status::TransferStatus;

/// Where the money goes: another account at this institution, addressed by
/// id, or an external account addressed by IBAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientRef {
    Internal(AccountId),
    External(Iban),
}

impl fmt::Display for RecipientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientRef::Internal(id) => write!(f, "{id}"),
            RecipientRef::External(iban) => write!(f, "{iban}"),
        }
    }
}

/// A funds transfer in any lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub sender: UserId,
    pub source_account: AccountId,
    pub recipient: RecipientRef,
    pub amount: Amount,
    pub currency: Currency,
    pub status: TransferStatus,
    /// Present for the two-phase path; P2P and standing-order transfers
    /// carry no challenge.
    pub challenge_id: Option<ChallengeId>,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// Create a transfer awaiting TAN confirmation. The id is minted by the
    /// caller because the challenge digest binds to it before construction.
    /// The `Initiated` state is passed through here; by the time the record
    /// is persisted it is already paired with a challenge.
    pub fn pending_tan(
        id: TransferId,
        sender: UserId,
        source_account: AccountId,
        recipient: RecipientRef,
        amount: Amount,
        currency: Currency,
        challenge_id: ChallengeId,
        reference: String,
        now: DateTime<Utc>,
    ) -> Self {
        let mut status = TransferStatus::Initiated;
        // Infallible: Initiated -> TanPending is always legal.
        let _ = status.transition(TransferStatus::TanPending);
        Self {
            id,
            sender,
            source_account,
            recipient,
            amount,
            currency,
            status,
            challenge_id: Some(challenge_id),
            reference,
            created_at: now,
            executed_at: None,
        }
    }

    /// Create an already-executed single-phase transfer (P2P, standing
    /// order). Constructed terminal; this is initial state, not a transition.
    pub fn executed_single_phase(
        sender: UserId,
        source_account: AccountId,
        recipient: RecipientRef,
        amount: Amount,
        currency: Currency,
        reference: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransferId::new(),
            sender,
            source_account,
            recipient,
            amount,
            currency,
            status: TransferStatus::Executed,
            challenge_id: None,
            reference,
            created_at: now,
            executed_at: Some(now),
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} -> {} amount={} {} status={}",
            self.id,
            self.source_account,
            self.recipient,
            self.amount.format(self.currency),
            self.currency,
            self.status
        )
    }
}

/// Parameters for initiating a two-phase transfer.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub source_account: AccountId,
    pub recipient: RecipientRef,
    pub amount: Amount,
    pub currency: Currency,
    pub reference: String,
}

/// Handle returned by a successful initiation.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateReceipt {
    pub transfer_id: TransferId,
    pub challenge_id: ChallengeId,
    /// Seconds until the TAN expires.
    pub expires_in: i64,
    /// Raw code, present only when the service is configured to expose it
    /// (development; delivery is an external channel in production).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_tan: Option<String>,
}

/// Parameters for confirming a two-phase transfer.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub transfer_id: TransferId,
    pub challenge_id: ChallengeId,
    pub code: String,
}

/// Result of a committed execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteReceipt {
    pub transfer_id: TransferId,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_tan_construction() {
        let t = Transfer::pending_tan(
            TransferId::new(),
            UserId(1),
            AccountId::new(),
            RecipientRef::Internal(AccountId::new()),
            Amount::from_minor(20_000),
            Currency::Eur,
            ChallengeId::new(),
            "Miete".into(),
            Utc::now(),
        );
        assert_eq!(t.status, TransferStatus::TanPending);
        assert!(t.challenge_id.is_some());
        assert!(t.executed_at.is_none());
    }

    #[test]
    fn test_single_phase_construction() {
        let t = Transfer::executed_single_phase(
            UserId(1),
            AccountId::new(),
            RecipientRef::Internal(AccountId::new()),
            Amount::from_minor(500),
            Currency::Eur,
            "Danke!".into(),
            Utc::now(),
        );
        assert_eq!(t.status, TransferStatus::Executed);
        assert!(t.challenge_id.is_none());
        assert!(t.executed_at.is_some());
    }
}
