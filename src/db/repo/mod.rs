//! Repository layer for the entity store.
//!
//! This module provides the `Repository` struct and the per-event `EntityTx`
//! unit of work. Methods are organized across submodules:
//! - `entities.rs` - `Entity` impls binding each record type to its table
//! - `history.rs` - undo log replay (rollback), pruning and state digest

mod entities;
mod history;

use crate::domain::EventId;
use crate::engine::PositionBalance;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::{Row, Transaction};
use thiserror::Error;

pub use history::RollbackSummary;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("entity body (de)serialization failed: {0}")]
    Body(#[from] serde_json::Error),
    #[error("unknown entity table in history: {0}")]
    UnknownTable(String),
    #[error("{field} {value} does not fit a SQLite integer")]
    OutOfRange { field: &'static str, value: u64 },
    #[error("cannot roll back to block {requested}: undo history through block {finalized} was pruned")]
    BelowFinalized { requested: u64, finalized: u64 },
}

/// Chain positions are stored as SQLite INTEGER, which is signed.
pub fn sql_position(field: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange { field, value })
}

/// One logical table per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTable {
    Accounts,
    Markets,
    PositionBalances,
    CostBases,
    LiquidityPositions,
}

impl EntityTable {
    pub const ALL: [EntityTable; 5] = [
        EntityTable::Accounts,
        EntityTable::Markets,
        EntityTable::PositionBalances,
        EntityTable::CostBases,
        EntityTable::LiquidityPositions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityTable::Accounts => "accounts",
            EntityTable::Markets => "markets",
            EntityTable::PositionBalances => "position_balances",
            EntityTable::CostBases => "cost_bases",
            EntityTable::LiquidityPositions => "liquidity_positions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// A record stored as a JSON body under a deterministic string key.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: EntityTable;

    fn id(&self) -> &str;

    fn account_scope(&self) -> Option<&str> {
        None
    }

    fn market_scope(&self) -> Option<&str> {
        None
    }
}

/// How an event left the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalStatus {
    Applied,
    Ignored,
    Malformed,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Applied => "applied",
            JournalStatus::Ignored => "ignored",
            JournalStatus::Malformed => "malformed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(JournalStatus::Applied),
            "ignored" => Some(JournalStatus::Ignored),
            "malformed" => Some(JournalStatus::Malformed),
            _ => None,
        }
    }
}

/// Repository for entity store operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Open the unit of work for one event. Nothing is visible to readers
    /// until [`EntityTx::commit`].
    pub async fn begin_event(
        &self,
        event: &EventId,
        block_number: u64,
    ) -> Result<EntityTx, StoreError> {
        let block_number = sql_position("block_number", block_number)?;
        let log_index = sql_position("log_index", event.log_index)?;
        let tx = self.pool.begin().await?;
        Ok(EntityTx {
            tx,
            event: event.clone(),
            block_number,
            log_index,
        })
    }

    /// Point read of a committed entity.
    pub async fn get<E: Entity>(&self, id: &str) -> Result<Option<E>, StoreError> {
        let body = fetch_body(&self.pool, E::TABLE, id).await?;
        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(StoreError::from)
    }

    /// All stored positions of an account in a market, ordered by key.
    pub async fn positions_for(
        &self,
        account: &str,
        market: &str,
    ) -> Result<Vec<PositionBalance>, StoreError> {
        let bodies = fetch_scoped_positions(&self.pool, account, market).await?;
        decode_all(bodies)
    }

    /// Journal status of an event key, if it has been processed.
    pub async fn journal_status(&self, event_key: &str) -> Result<Option<JournalStatus>, StoreError> {
        let row = sqlx::query("SELECT status FROM processed_events WHERE id = ?")
            .bind(event_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| JournalStatus::parse(&r.get::<String, _>("status"))))
    }

    /// Last applied (block_number, log_index).
    pub async fn cursor(&self) -> Result<Option<(u64, u64)>, StoreError> {
        let row = sqlx::query("SELECT block_number, log_index FROM indexer_cursor WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| {
            (
                r.get::<i64, _>("block_number") as u64,
                r.get::<i64, _>("log_index") as u64,
            )
        }))
    }

    /// Number of stored rows of one entity type.
    pub async fn count(&self, table: EntityTable) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", table.name());
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("n"))
    }
}

/// Unit of work for applying a single event.
///
/// Every `put` records the entity's prior image in the undo history under
/// this event's block so the write can be reverted by a rollback.
pub struct EntityTx {
    tx: Transaction<'static, Sqlite>,
    event: EventId,
    block_number: i64,
    log_index: i64,
}

impl EntityTx {
    /// Dedupe gate: has this event key already been journaled?
    pub async fn is_processed(&mut self) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM processed_events WHERE id = ?")
            .bind(self.event.key())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.is_some())
    }

    /// Cursor as seen inside this transaction.
    pub async fn cursor(&mut self) -> Result<Option<(u64, u64)>, StoreError> {
        let row = sqlx::query("SELECT block_number, log_index FROM indexer_cursor WHERE id = 1")
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|r| {
            (
                r.get::<i64, _>("block_number") as u64,
                r.get::<i64, _>("log_index") as u64,
            )
        }))
    }

    pub async fn get<E: Entity>(&mut self, id: &str) -> Result<Option<E>, StoreError> {
        let body = fetch_body(&mut *self.tx, E::TABLE, id).await?;
        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(StoreError::from)
    }

    pub async fn get_or_create<E, F>(&mut self, id: &str, create: F) -> Result<E, StoreError>
    where
        E: Entity,
        F: FnOnce() -> E + Send,
    {
        if let Some(existing) = self.get::<E>(id).await? {
            return Ok(existing);
        }
        let entity = create();
        self.put(&entity).await?;
        Ok(entity)
    }

    pub async fn put<E: Entity>(&mut self, entity: &E) -> Result<(), StoreError> {
        let body = serde_json::to_string(entity)?;
        let prior = fetch_body(&mut *self.tx, E::TABLE, entity.id()).await?;
        if prior.as_deref() == Some(body.as_str()) {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO entity_history
            (block_number, event_id, table_name, entity_id, account_id, market_id, prior_body)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.block_number)
        .bind(self.event.key())
        .bind(E::TABLE.name())
        .bind(entity.id())
        .bind(entity.account_scope())
        .bind(entity.market_scope())
        .bind(prior.as_deref())
        .execute(&mut *self.tx)
        .await?;

        let sql = format!(
            r#"
            INSERT INTO {} (id, account_id, market_id, body)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                market_id = excluded.market_id,
                body = excluded.body
            "#,
            E::TABLE.name()
        );
        sqlx::query(&sql)
            .bind(entity.id())
            .bind(entity.account_scope())
            .bind(entity.market_scope())
            .bind(&body)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    /// Positions of an account in a market as seen inside this transaction.
    pub async fn positions_for(
        &mut self,
        account: &str,
        market: &str,
    ) -> Result<Vec<PositionBalance>, StoreError> {
        let bodies = fetch_scoped_positions(&mut *self.tx, account, market).await?;
        decode_all(bodies)
    }

    /// Journal the event and move the cursor to it.
    pub async fn journal(
        &mut self,
        event_name: &str,
        status: JournalStatus,
        detail: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO processed_events
            (id, block_number, log_index, event_name, status, detail, applied_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.event.key())
        .bind(self.block_number)
        .bind(self.log_index)
        .bind(event_name)
        .bind(status.as_str())
        .bind(detail)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *self.tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO indexer_cursor (id, block_number, log_index)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                block_number = excluded.block_number,
                log_index = excluded.log_index
            "#,
        )
        .bind(self.block_number)
        .bind(self.log_index)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

async fn fetch_body<'e, X>(
    executor: X,
    table: EntityTable,
    id: &str,
) -> Result<Option<String>, sqlx::Error>
where
    X: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT body FROM {} WHERE id = ?", table.name());
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    Ok(row.map(|r| r.get::<String, _>("body")))
}

async fn fetch_scoped_positions<'e, X>(
    executor: X,
    account: &str,
    market: &str,
) -> Result<Vec<String>, sqlx::Error>
where
    X: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT body FROM position_balances
        WHERE account_id = ? AND market_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(account)
    .bind(market)
    .fetch_all(executor)
    .await?;
    Ok(rows.iter().map(|r| r.get::<String, _>("body")).collect())
}

fn decode_all<E: Entity>(bodies: Vec<String>) -> Result<Vec<E>, StoreError> {
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(StoreError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{AccountId, BlockTime, Market, MarketId, OutcomeId};
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_get_or_create_then_get() {
        let (repo, _temp) = setup_test_db().await;
        let event = EventId::new("0xaa", 0);

        let mut tx = repo.begin_event(&event, 10).await.unwrap();
        let market: Market = tx
            .get_or_create("m1", || Market::new(MarketId::new("m1"), BlockTime::new(5)))
            .await
            .unwrap();
        assert_eq!(market.created_at, BlockTime::new(5));

        // A second get_or_create returns the stored record, not a fresh one.
        let again: Market = tx
            .get_or_create("m1", || Market::new(MarketId::new("m1"), BlockTime::new(99)))
            .await
            .unwrap();
        assert_eq!(again.created_at, BlockTime::new(5));
        tx.commit().await.unwrap();

        let stored: Option<Market> = repo.get("m1").await.unwrap();
        assert_eq!(stored, Some(market));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let (repo, _temp) = setup_test_db().await;
        let event = EventId::new("0xaa", 0);

        let mut tx = repo.begin_event(&event, 10).await.unwrap();
        tx.put(&Market::new(MarketId::new("m1"), BlockTime::new(5)))
            .await
            .unwrap();
        drop(tx);

        let stored: Option<Market> = repo.get("m1").await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_journal_marks_processed_and_moves_cursor() {
        let (repo, _temp) = setup_test_db().await;
        let event = EventId::new("0xbb", 4);

        let mut tx = repo.begin_event(&event, 12).await.unwrap();
        assert!(!tx.is_processed().await.unwrap());
        tx.journal("SharesSwapped", JournalStatus::Applied, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            repo.journal_status("0xbb-4").await.unwrap(),
            Some(JournalStatus::Applied)
        );
        assert_eq!(repo.cursor().await.unwrap(), Some((12, 4)));

        let mut tx = repo.begin_event(&event, 12).await.unwrap();
        assert!(tx.is_processed().await.unwrap());
    }

    #[tokio::test]
    async fn test_positions_for_scans_account_market() {
        let (repo, _temp) = setup_test_db().await;
        let event = EventId::new("0xcc", 0);
        let account = AccountId::new("0xa");
        let market = MarketId::new("m");

        let mut tx = repo.begin_event(&event, 1).await.unwrap();
        for outcome in 0..3 {
            tx.put(&PositionBalance::new(
                account.clone(),
                market.clone(),
                OutcomeId::new(outcome),
            ))
            .await
            .unwrap();
        }
        tx.put(&PositionBalance::new(
            AccountId::new("0xb"),
            market.clone(),
            OutcomeId::new(0),
        ))
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let positions = repo.positions_for("0xa", "m").await.unwrap();
        assert_eq!(positions.len(), 3);
        assert_eq!(repo.count(EntityTable::PositionBalances).await.unwrap(), 4);
    }

    #[test]
    fn test_table_names_round_trip() {
        for table in EntityTable::ALL {
            assert_eq!(EntityTable::from_name(table.name()), Some(table));
        }
        assert_eq!(EntityTable::from_name("raw_fills"), None);
    }
}
