//! Balance ledger boundary.
//!
//! The coordinator never owns balances. It reads them through [`Ledger`] and
//! hands every finished game to [`Ledger::settle`]; the ledger must treat a
//! second settlement of the same game id as a no-op.

mod settlement;
mod sqlite;

pub use settlement::{FailedSettlement, SettlementQueue};
pub use sqlite::SqliteLedger;

use crate::game::{GameError, GameOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Settlement rejected for game {game_id}: {reason}")]
    Rejected { game_id: String, reason: String },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Worth retrying: the ledger may accept the same request later.
    /// A rejection is final.
    pub fn is_transient(&self) -> bool {
        !matches!(self, LedgerError::Rejected { .. })
    }
}

impl From<LedgerError> for GameError {
    fn from(err: LedgerError) -> Self {
        GameError::Ledger(err.to_string())
    }
}

/// Balance movement applied by a settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub participant_id: String,
    pub delta: i64,
    pub balance: i64,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, participant_id: &str) -> Result<i64, LedgerError>;

    /// Applies every player's net result for one game. Idempotent per game id.
    async fn settle(&self, outcome: &GameOutcome) -> Result<Vec<BalanceChange>, LedgerError>;
}
