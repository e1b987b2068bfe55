use super::{BalanceChange, Ledger, LedgerError};
use crate::audit;
use crate::config::SettlementConfig;
use crate::game::GameOutcome;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A game outcome the ledger never accepted
#[derive(Debug, Clone)]
pub struct FailedSettlement {
    pub outcome: GameOutcome,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
    /// False once the ledger has rejected the outcome outright
    pub retryable: bool,
}

/// Delivers game outcomes to the ledger, retrying with exponential backoff.
///
/// Game state is final by the time an outcome gets here; a settlement that
/// keeps failing is parked in the failed list instead of being undone.
/// Outcomes stay tracked as unsettled until the ledger confirms or rejects
/// them, so their losses can be held back from what a player may stake.
pub struct SettlementQueue {
    ledger: Arc<dyn Ledger>,
    config: SettlementConfig,
    failed: Mutex<Vec<FailedSettlement>>,
    unsettled: Mutex<HashMap<String, GameOutcome>>,
}

impl SettlementQueue {
    pub fn new(ledger: Arc<dyn Ledger>, config: SettlementConfig) -> Self {
        Self {
            ledger,
            config,
            failed: Mutex::new(Vec::new()),
            unsettled: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Marks an outcome as owed to the ledger. Call before handing it to
    /// [`SettlementQueue::settle_with_retry`].
    pub async fn track(&self, outcome: &GameOutcome) {
        self.unsettled
            .lock()
            .await
            .insert(outcome.game_id.clone(), outcome.clone());
    }

    /// Stops holding an outcome's losses once its balances are published
    pub async fn release(&self, game_id: &str) {
        self.unsettled.lock().await.remove(game_id);
    }

    /// Chips a participant has lost in games the ledger has not applied yet
    pub async fn unsettled_losses(&self, participant_id: &str) -> i64 {
        self.unsettled
            .lock()
            .await
            .values()
            .filter_map(|outcome| outcome.result_for(participant_id))
            .map(|result| (-result.net).max(0))
            .sum()
    }

    /// Settles one outcome, sleeping between attempts. Runs in its own task;
    /// the caller decides what to do with the confirmed balance changes and
    /// calls [`SettlementQueue::release`] once they are published.
    ///
    /// Only transient errors are retried. A rejected outcome is parked at
    /// once and never requeued.
    pub async fn settle_with_retry(
        &self,
        outcome: &GameOutcome,
    ) -> Result<Vec<BalanceChange>, LedgerError> {
        let mut attempt = 1;
        loop {
            match self.ledger.settle(outcome).await {
                Ok(changes) => {
                    audit::log_settlement(&outcome.game_id, attempt, true, "");
                    return Ok(changes);
                }
                Err(e) if !e.is_transient() => {
                    audit::log_settlement(&outcome.game_id, attempt, false, &e.to_string());
                    tracing::error!(
                        game_id = %outcome.game_id,
                        attempts = attempt,
                        error = %e,
                        "Settlement rejected by ledger, parking outcome"
                    );
                    self.unsettled.lock().await.remove(&outcome.game_id);
                    self.park(outcome, attempt, &e, false).await;
                    return Err(e);
                }
                Err(e) => {
                    audit::log_settlement(&outcome.game_id, attempt, false, &e.to_string());
                    if attempt >= self.config.max_attempts {
                        tracing::error!(
                            game_id = %outcome.game_id,
                            attempts = attempt,
                            error = %e,
                            "Settlement failed permanently, parking outcome"
                        );
                        self.park(outcome, attempt, &e, true).await;
                        return Err(e);
                    }
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn park(&self, outcome: &GameOutcome, attempts: u32, err: &LedgerError, retryable: bool) {
        self.failed.lock().await.push(FailedSettlement {
            outcome: outcome.clone(),
            attempts,
            last_error: err.to_string(),
            failed_at: Utc::now(),
            retryable,
        });
    }

    pub async fn failed_settlements(&self) -> Vec<FailedSettlement> {
        self.failed.lock().await.clone()
    }

    /// Removes the retryable entries from the failed list and hands their
    /// outcomes back for resubmission. Rejected outcomes stay listed.
    pub async fn take_failed(&self) -> Vec<GameOutcome> {
        let mut failed = self.failed.lock().await;
        let (retry, keep): (Vec<_>, Vec<_>) = failed.drain(..).partition(|f| f.retryable);
        *failed = keep;
        retry.into_iter().map(|f| f.outcome).collect()
    }
}
