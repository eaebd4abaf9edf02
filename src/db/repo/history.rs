//! Undo history: rollback after a reorg, pruning below finality, and a
//! digest of materialized state for convergence checks.

use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::{info, warn};

use super::{sql_position, EntityTable, Repository, StoreError};

/// What a rollback undid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub events_removed: u64,
    pub entities_restored: u64,
    pub entities_deleted: u64,
}

impl Repository {
    /// Revert every write made by events in blocks above `block_number`.
    ///
    /// Prior images are restored newest-first, so an entity touched several
    /// times ends at the image it had before the first rolled-back write.
    ///
    /// Fails with [`StoreError::BelowFinalized`] when the undo records needed
    /// to reach `block_number` were pruned.
    pub async fn rollback_to(&self, block_number: u64) -> Result<RollbackSummary, StoreError> {
        let target = sql_position("block_number", block_number)?;
        let mut tx = self.pool.begin().await?;
        let mut summary = RollbackSummary::default();

        let horizon = sqlx::query("SELECT finalized_block FROM history_horizon WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await?
            .map(|r| r.get::<i64, _>("finalized_block"));
        if let Some(finalized) = horizon.filter(|finalized| target < *finalized) {
            return Err(StoreError::BelowFinalized {
                requested: block_number,
                finalized: finalized as u64,
            });
        }

        let rows = sqlx::query(
            r#"
            SELECT table_name, entity_id, account_id, market_id, prior_body
            FROM entity_history
            WHERE block_number > ?
            ORDER BY seq DESC
            "#,
        )
        .bind(target)
        .fetch_all(&mut *tx)
        .await?;

        for row in rows {
            let table_name: String = row.get("table_name");
            let table = EntityTable::from_name(&table_name)
                .ok_or_else(|| StoreError::UnknownTable(table_name.clone()))?;
            let entity_id: String = row.get("entity_id");
            let prior_body: Option<String> = row.get("prior_body");

            match prior_body {
                Some(body) => {
                    let sql = format!(
                        r#"
                        INSERT INTO {} (id, account_id, market_id, body)
                        VALUES (?, ?, ?, ?)
                        ON CONFLICT(id) DO UPDATE SET body = excluded.body
                        "#,
                        table.name()
                    );
                    sqlx::query(&sql)
                        .bind(&entity_id)
                        .bind(row.get::<Option<String>, _>("account_id"))
                        .bind(row.get::<Option<String>, _>("market_id"))
                        .bind(body)
                        .execute(&mut *tx)
                        .await?;
                    summary.entities_restored += 1;
                }
                None => {
                    let sql = format!("DELETE FROM {} WHERE id = ?", table.name());
                    sqlx::query(&sql).bind(&entity_id).execute(&mut *tx).await?;
                    summary.entities_deleted += 1;
                }
            }
        }

        sqlx::query("DELETE FROM entity_history WHERE block_number > ?")
            .bind(target)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM processed_events WHERE block_number > ?")
            .bind(target)
            .execute(&mut *tx)
            .await?;
        summary.events_removed = removed.rows_affected();

        let last = sqlx::query(
            r#"
            SELECT block_number, log_index FROM processed_events
            ORDER BY block_number DESC, log_index DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        match last {
            Some(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO indexer_cursor (id, block_number, log_index)
                    VALUES (1, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        block_number = excluded.block_number,
                        log_index = excluded.log_index
                    "#,
                )
                .bind(r.get::<i64, _>("block_number"))
                .bind(r.get::<i64, _>("log_index"))
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM indexer_cursor")
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        info!(
            block_number,
            events_removed = summary.events_removed,
            entities_restored = summary.entities_restored,
            entities_deleted = summary.entities_deleted,
            "Rolled back ledger"
        );
        Ok(summary)
    }

    /// Drop undo history at or below a finalized block. Blocks below it can
    /// no longer be rolled back; the horizon only moves forward.
    pub async fn prune_history(&self, finalized_block: u64) -> Result<u64, StoreError> {
        let finalized = sql_position("block_number", finalized_block)?;
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM entity_history WHERE block_number <= ?")
            .bind(finalized)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO history_horizon (id, finalized_block)
            VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET
                finalized_block = MAX(finalized_block, excluded.finalized_block)
            "#,
        )
        .bind(finalized)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() > 0 {
            info!(
                finalized_block,
                pruned = result.rows_affected(),
                "Pruned entity history"
            );
        }
        Ok(result.rows_affected())
    }

    /// Lowest block a rollback may still target, once history was pruned.
    pub async fn finalized_block(&self) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT finalized_block FROM history_horizon WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("finalized_block") as u64))
    }

    /// SHA-256 over every entity row in table and key order, hex encoded.
    ///
    /// Two stores that materialized the same event sequence produce the same
    /// digest regardless of how they got there.
    pub async fn state_digest(&self) -> Result<String, StoreError> {
        let mut hasher = Sha256::new();

        for table in EntityTable::ALL {
            let sql = format!("SELECT id, body FROM {} ORDER BY id ASC", table.name());
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            hasher.update(table.name().as_bytes());
            hasher.update((rows.len() as u64).to_le_bytes());
            for row in rows {
                let id: String = row.get("id");
                let body: String = row.get("body");
                hasher.update((id.len() as u64).to_le_bytes());
                hasher.update(id.as_bytes());
                hasher.update((body.len() as u64).to_le_bytes());
                hasher.update(body.as_bytes());
            }
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Number of undo records, for diagnostics.
    pub async fn history_len(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM entity_history")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        if n > 100_000 {
            warn!(history_len = n, "Entity history is large; consider pruning finalized blocks");
        }
        Ok(n)
    }
}
