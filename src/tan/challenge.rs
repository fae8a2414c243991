//! TAN challenge record and verification rules.
//!
//! Codes are never stored; only their SHA-256 digest is. Each challenge is
//! dynamically linked to the transfer details it authorizes and bound to the
//! user who initiated it.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core_types::{ChallengeId, TransferId, UserId};
use crate::money::Amount;

/// One-time authorization challenge paired 1:1 with a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TanChallenge {
    pub id: ChallengeId,
    pub transfer_id: TransferId,
    /// Session binding: only the initiating user may answer this challenge.
    pub user_id: UserId,
    code_digest: String,
    /// Binds the challenge to (transfer, amount, recipient).
    link_digest: String,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: u32,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of evaluating a submitted code against a challenge.
///
/// The evaluation mutates the challenge (attempt decrement, consumption); the
/// caller persists it in the same atomic unit as any dependent mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TanVerdict {
    /// Code correct; challenge is now consumed.
    Approved,
    /// Challenge was already consumed by an earlier verification.
    AlreadyUsed,
    /// Past expiry; code not even inspected.
    Expired,
    /// No attempts left; challenge is now locked (consumed).
    Exhausted,
    /// Submitted transfer details do not match the challenge binding.
    LinkMismatch,
    /// Wrong code; one attempt burned.
    WrongCode { remaining: u32 },
}

impl TanChallenge {
    /// Issue a challenge for a transfer. Returns the challenge and the raw
    /// code; delivering the code to the user is an external concern.
    pub fn issue<R: Rng>(
        rng: &mut R,
        transfer_id: TransferId,
        user_id: UserId,
        amount: Amount,
        recipient: &str,
        code_length: usize,
        ttl_secs: i64,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> (TanChallenge, String) {
        let code: String = (0..code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10)))
            .collect();
        let challenge = TanChallenge {
            id: ChallengeId::new(),
            transfer_id,
            user_id,
            code_digest: sha256_hex(code.as_bytes()),
            link_digest: link_digest(transfer_id, amount, recipient),
            expires_at: now + chrono::Duration::seconds(ttl_secs),
            attempts_remaining: max_attempts,
            consumed: false,
            created_at: now,
        };
        (challenge, code)
    }

    /// Whether the challenge is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Evaluate a submitted code.
    ///
    /// Check order: consumption, expiry, attempt budget, dynamic link, code.
    /// Expiry and exhaustion reject regardless of code correctness.
    pub fn evaluate(
        &mut self,
        submitted: &str,
        amount: Amount,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> TanVerdict {
        if self.consumed {
            return TanVerdict::AlreadyUsed;
        }
        if self.is_expired(now) {
            return TanVerdict::Expired;
        }
        if self.attempts_remaining == 0 {
            self.consumed = true;
            return TanVerdict::Exhausted;
        }
        if self.link_digest != link_digest(self.transfer_id, amount, recipient) {
            return TanVerdict::LinkMismatch;
        }
        if self.code_digest != sha256_hex(submitted.trim().as_bytes()) {
            self.attempts_remaining -= 1;
            return TanVerdict::WrongCode {
                remaining: self.attempts_remaining,
            };
        }
        self.consumed = true;
        TanVerdict::Approved
    }
}

/// Dynamic-linking digest over the exact transfer details a TAN authorizes.
fn link_digest(transfer_id: TransferId, amount: Amount, recipient: &str) -> String {
    sha256_hex(format!("{}:{}:{}", transfer_id, amount.minor(), recipient).as_bytes())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
