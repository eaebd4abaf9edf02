//! Incremental application of raw events to the entity store.

use super::handlers::{apply_event, HandlerContext, HandlerError};
use super::{ApplyOutcome, BatchSummary, EventShape, IndexCursor};
use crate::datasource::MarketMetadata;
use crate::db::{JournalStatus, Repository, RollbackSummary, StoreError};
use crate::domain::{sort_events_deterministic, RawEvent};
use crate::engine::AccountingParams;
use crate::error::IndexerError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single writer over the entity store. Each event is one transaction.
pub struct Indexer {
    repo: Arc<Repository>,
    shape: EventShape,
    params: AccountingParams,
    metadata: Arc<dyn MarketMetadata>,
}

impl Indexer {
    pub fn new(
        repo: Arc<Repository>,
        shape: EventShape,
        params: AccountingParams,
        metadata: Arc<dyn MarketMetadata>,
    ) -> Self {
        Self {
            repo,
            shape,
            params,
            metadata,
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Apply one event.
    ///
    /// Only storage failures are returned as errors. Anything wrong with the
    /// event itself is journaled and reported through [`ApplyOutcome`].
    pub async fn apply_event(&self, raw: &RawEvent) -> Result<ApplyOutcome, IndexerError> {
        let id = raw.event_id();
        let mut tx = match self.repo.begin_event(&id, raw.block_number).await {
            Ok(tx) => tx,
            // No journal row can hold this position, so it is reported only.
            Err(e @ StoreError::OutOfRange { .. }) => {
                let reason = e.to_string();
                warn!(event_id = %id, error = %reason, "Malformed event position");
                return Ok(ApplyOutcome::Malformed(reason));
            }
            Err(e) => return Err(e.into()),
        };

        if tx.is_processed().await? {
            debug!(event_id = %id, "Skipping duplicate event");
            return Ok(ApplyOutcome::Duplicate);
        }

        let cursor = IndexCursor::from(tx.cursor().await?);
        if !cursor.admits(raw.block_number, raw.log_index) {
            warn!(
                event_id = %id,
                block_number = raw.block_number,
                cursor = ?cursor.last,
                "Skipping event behind the cursor"
            );
            return Ok(ApplyOutcome::OutOfOrder);
        }

        let event = match self.shape.decode(raw) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tx.journal(&raw.event_name, JournalStatus::Ignored, None)
                    .await?;
                tx.commit().await?;
                debug!(event_id = %id, event_name = %raw.event_name, "Ignored event");
                return Ok(ApplyOutcome::Ignored);
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(event_id = %id, error = %reason, "Malformed event");
                tx.journal(&raw.event_name, JournalStatus::Malformed, Some(&reason))
                    .await?;
                tx.commit().await?;
                return Ok(ApplyOutcome::Malformed(reason));
            }
        };

        let ctx = HandlerContext {
            params: &self.params,
            metadata: self.metadata.as_ref(),
        };

        match apply_event(&mut tx, &ctx, &event).await {
            Ok(()) => {
                tx.journal(event.kind.name(), JournalStatus::Applied, None)
                    .await?;
                tx.commit().await?;
                debug!(
                    event_id = %id,
                    event_name = event.kind.name(),
                    account = %event.kind.account(),
                    market = %event.kind.market(),
                    "Applied event"
                );
                Ok(ApplyOutcome::Applied)
            }
            Err(HandlerError::Store(e)) => Err(e.into()),
            Err(HandlerError::Accounting(e)) => {
                // Discard every partial write of this event before journaling.
                drop(tx);
                let reason = e.to_string();
                warn!(
                    event_id = %id,
                    account = %event.kind.account(),
                    market = %event.kind.market(),
                    error = %reason,
                    "Event rejected by accounting, rolled back"
                );
                let mut tx = self.repo.begin_event(&id, raw.block_number).await?;
                tx.journal(event.kind.name(), JournalStatus::Malformed, Some(&reason))
                    .await?;
                tx.commit().await?;
                Ok(ApplyOutcome::Malformed(reason))
            }
        }
    }

    /// Sort into emission order and apply each event.
    pub async fn apply_batch(&self, mut events: Vec<RawEvent>) -> Result<BatchSummary, IndexerError> {
        sort_events_deterministic(&mut events);

        let mut summary = BatchSummary::default();
        for raw in &events {
            let outcome = self.apply_event(raw).await?;
            summary.record(&outcome);
        }

        info!(
            total = summary.total(),
            applied = summary.applied,
            duplicates = summary.duplicates,
            ignored = summary.ignored,
            malformed = summary.malformed,
            out_of_order = summary.out_of_order,
            "Applied event batch"
        );
        Ok(summary)
    }

    /// Undo every event above `block_number` so a revised event set can be
    /// applied.
    pub async fn rollback_to(&self, block_number: u64) -> Result<RollbackSummary, IndexerError> {
        Ok(self.repo.rollback_to(block_number).await?)
    }
}
