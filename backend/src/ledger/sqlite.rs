use super::{BalanceChange, Ledger, LedgerError};
use crate::db::DbPool;
use crate::game::constants::DEFAULT_STARTING_BALANCE;
use crate::game::GameOutcome;
use async_trait::async_trait;

/// Reference ledger on SQLite: a balance per participant, one settlement row
/// per game and a journal of every balance movement.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: DbPool,
    starting_balance: i64,
}

impl SqliteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }

    /// Overwrites a balance. Used for seeding accounts.
    pub async fn set_balance(&self, participant_id: &str, balance: i64) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO balances (participant_id, balance) VALUES (?, ?)
             ON CONFLICT(participant_id) DO UPDATE SET balance = excluded.balance, updated_at = datetime('now')",
        )
        .bind(participant_id)
        .bind(balance)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_settled(&self, game_id: &str) -> Result<bool, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settlements WHERE game_id = ?")
            .bind(game_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn entries_for(&self, game_id: &str) -> Result<Vec<BalanceChange>, LedgerError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT participant_id, delta, balance_after FROM ledger_entries
             WHERE game_id = ? ORDER BY id",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(participant_id, delta, balance)| BalanceChange {
                participant_id,
                delta,
                balance,
            })
            .collect())
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn balance(&self, participant_id: &str) -> Result<i64, LedgerError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM balances WHERE participant_id = ?")
                .bind(participant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance.unwrap_or(self.starting_balance))
    }

    async fn settle(&self, outcome: &GameOutcome) -> Result<Vec<BalanceChange>, LedgerError> {
        let net_total: i64 = outcome.results.iter().map(|r| r.net).sum();
        if net_total != 0 {
            return Err(LedgerError::Rejected {
                game_id: outcome.game_id.clone(),
                reason: format!("net results sum to {} instead of 0", net_total),
            });
        }

        if self.is_settled(&outcome.game_id).await? {
            tracing::debug!(game_id = %outcome.game_id, "game already settled");
            return self.entries_for(&outcome.game_id).await;
        }

        let outcome_json = serde_json::to_string(outcome).map_err(|e| LedgerError::Rejected {
            game_id: outcome.game_id.clone(),
            reason: e.to_string(),
        })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO settlements (game_id, room_id, game_type, pot, outcome_json)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&outcome.game_id)
        .bind(&outcome.room_id)
        .bind(outcome.game_type.id())
        .bind(outcome.pot)
        .bind(&outcome_json)
        .execute(&mut *tx)
        .await?;

        let mut changes = Vec::with_capacity(outcome.results.len());
        for result in &outcome.results {
            sqlx::query("INSERT OR IGNORE INTO balances (participant_id, balance) VALUES (?, ?)")
                .bind(&result.player_id)
                .bind(self.starting_balance)
                .execute(&mut *tx)
                .await?;

            let balance: i64 = sqlx::query_scalar(
                "UPDATE balances SET balance = balance + ?, updated_at = datetime('now')
                 WHERE participant_id = ?
                 RETURNING balance",
            )
            .bind(result.net)
            .bind(&result.player_id)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO ledger_entries (game_id, participant_id, delta, balance_after)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&outcome.game_id)
            .bind(&result.player_id)
            .bind(result.net)
            .bind(balance)
            .execute(&mut *tx)
            .await?;

            changes.push(BalanceChange {
                participant_id: result.player_id.clone(),
                delta: result.net,
                balance,
            });
        }

        tx.commit().await?;
        Ok(changes)
    }
}
