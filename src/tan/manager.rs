//! TAN Challenge Manager
//!
//! Issues challenges and sweeps expired ones. Verification itself happens
//! inside the transfer orchestrator's atomic unit so that consumption commits
//! together with the ledger mutation it authorizes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::TanConfig;
use crate::core_types::{TransferId, UserId};
use crate::error::BankError;
use crate::ledger::store::TransactionalStore;
use crate::money::Amount;
use crate::transfer::TransferStatus;

use super::challenge::TanChallenge;

pub struct TanManager<S> {
    store: Arc<S>,
    config: TanConfig,
}

impl<S: TransactionalStore> TanManager<S> {
    pub fn new(store: Arc<S>, config: TanConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TanConfig {
        &self.config
    }

    /// Build a challenge for a transfer. The caller persists it in the same
    /// atomic unit as the transfer record; the raw code goes to the delivery
    /// channel, never to storage.
    pub fn issue(
        &self,
        transfer_id: TransferId,
        user: UserId,
        amount: Amount,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> (TanChallenge, String) {
        let mut rng = rand::thread_rng();
        TanChallenge::issue(
            &mut rng,
            transfer_id,
            user,
            amount,
            recipient,
            self.config.length,
            self.config.ttl_secs,
            self.config.max_attempts,
            now,
        )
    }

    /// Periodic sweep: transfers still waiting on a challenge past its expiry
    /// transition to Expired. Returns the number of transfers swept.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, BankError> {
        let swept = self
            .store
            .run_atomic(|tx| {
                let mut count = 0usize;
                for mut transfer in tx.transfers_awaiting_tan()? {
                    let Some(challenge_id) = transfer.challenge_id else {
                        continue;
                    };
                    let Some(challenge) = tx.challenge(challenge_id)? else {
                        continue;
                    };
                    if challenge.consumed || !challenge.is_expired(now) {
                        continue;
                    }
                    transfer.status.transition(TransferStatus::Expired)?;
                    tx.put_transfer(transfer);
                    count += 1;
                }
                Ok(count)
            })
            .await?;

        if swept > 0 {
            info!(count = swept, "Expired pending transfers");
        }
        Ok(swept)
    }
}
