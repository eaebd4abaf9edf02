use crate::compile::{BatchSummary, Indexer};
use crate::datasource::EventSource;
use crate::db::RollbackSummary;
use crate::error::IndexerError;
use std::sync::Arc;
use tracing::info;

/// Result of one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub rollback: Option<RollbackSummary>,
    pub fetched: usize,
    pub batch: BatchSummary,
    pub cursor: Option<(u64, u64)>,
    pub state_digest: String,
    /// Undo records dropped because their block fell out of retention.
    pub history_pruned: u64,
}

/// Drives an [`Indexer`] from an [`EventSource`].
#[derive(Clone)]
pub struct Orchestrator {
    source: Arc<dyn EventSource>,
    indexer: Arc<Indexer>,
    history_retention: Option<u64>,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn EventSource>, indexer: Arc<Indexer>) -> Self {
        Self {
            source,
            indexer,
            history_retention: None,
        }
    }

    /// Keep undo history for only the last `blocks` blocks behind the cursor.
    /// Anything older can no longer be rolled back.
    pub fn with_history_retention(mut self, blocks: Option<u64>) -> Self {
        self.history_retention = blocks;
        self
    }

    /// Optionally roll back to a block, then fetch and apply every event.
    ///
    /// Events already journaled are skipped, so replaying the same log twice
    /// leaves the store unchanged.
    pub async fn replay(&self, rollback_to: Option<u64>) -> Result<ReplaySummary, IndexerError> {
        let rollback = match rollback_to {
            Some(block) => Some(self.indexer.rollback_to(block).await?),
            None => None,
        };

        let events = self.source.fetch_events().await?;
        let fetched = events.len();
        info!(fetched, "Fetched events");

        let batch = self.indexer.apply_batch(events).await?;
        let repo = self.indexer.repo();
        let cursor = repo.cursor().await?;
        let state_digest = repo.state_digest().await?;

        let history_pruned = match (self.history_retention, cursor) {
            (Some(retention), Some((block, _))) if block > retention => {
                repo.prune_history(block - retention).await?
            }
            _ => 0,
        };
        let history_len = repo.history_len().await?;

        info!(
            total = batch.total(),
            applied = batch.applied,
            malformed = batch.malformed,
            cursor = ?cursor,
            history_len,
            state_digest = %state_digest,
            "Replay complete"
        );

        Ok(ReplaySummary {
            rollback,
            fetched,
            batch,
            cursor,
            state_digest,
            history_pruned,
        })
    }
}
