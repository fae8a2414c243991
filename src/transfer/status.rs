//! Transfer FSM State Definitions
//!
//! Transitions are forward-only and statically enumerated; nothing re-enters
//! `Initiated` or `TanPending`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// Transfer lifecycle states.
///
/// ```text
/// Initiated → TanPending → { Executed | Expired | Failed }
/// ```
///
/// Terminal states: `Executed`, `Expired`, `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Request validated and recorded.
    Initiated,
    /// Waiting for TAN confirmation.
    TanPending,
    /// Terminal: funds moved, ledger entries written.
    Executed,
    /// Terminal: TAN expired before confirmation.
    Expired,
    /// Terminal: TAN attempts exhausted; re-initiation required.
    Failed,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Executed | TransferStatus::Expired | TransferStatus::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Initiated, TransferStatus::TanPending)
                | (TransferStatus::TanPending, TransferStatus::Executed)
                | (TransferStatus::TanPending, TransferStatus::Expired)
                | (TransferStatus::TanPending, TransferStatus::Failed)
        )
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Initiated => "INITIATED",
            TransferStatus::TanPending => "TAN_PENDING",
            TransferStatus::Executed => "EXECUTED",
            TransferStatus::Expired => "EXPIRED",
            TransferStatus::Failed => "FAILED",
        }
    }

    /// Validated transition; illegal moves are rejected, not silently applied.
    pub fn transition(&mut self, next: TransferStatus) -> Result<(), BankError> {
        if !self.can_transition(next) {
            return Err(BankError::InvalidStateTransition(format!(
                "{} -> {}",
                self.as_str(),
                next.as_str()
            )));
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
