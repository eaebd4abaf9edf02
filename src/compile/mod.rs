//! Incremental compilation of the event stream into ledger entities.
//!
//! This module provides:
//! - The event-shape adapter (raw normalizer record to typed event)
//! - Per-event handlers over a single-event unit of work
//! - Cursor-based incremental application with dedupe and rollback

use serde::{Deserialize, Serialize};

pub mod adapter;
pub mod handlers;
pub mod incremental;

pub use adapter::{DecodeError, EventShape};
pub use incremental::Indexer;

/// Position of the last journaled event, used to resume after a restart and
/// to reject events that arrive behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCursor {
    pub last: Option<(u64, u64)>,
}

impl IndexCursor {
    /// True when (block_number, log_index) lies strictly after the cursor.
    pub fn admits(&self, block_number: u64, log_index: u64) -> bool {
        match self.last {
            None => true,
            Some(last) => (block_number, log_index) > last,
        }
    }
}

impl From<Option<(u64, u64)>> for IndexCursor {
    fn from(last: Option<(u64, u64)>) -> Self {
        Self { last }
    }
}

/// What happened to one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Already journaled; nothing was written.
    Duplicate,
    /// Not an event the ledger tracks; journaled as ignored.
    Ignored,
    /// Journaled as malformed with the reason; no entity was changed.
    Malformed(String),
    /// Not a duplicate but behind the cursor; skipped without journaling.
    OutOfOrder,
}

/// Tally of outcomes over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub malformed: usize,
    pub out_of_order: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::Duplicate => self.duplicates += 1,
            ApplyOutcome::Ignored => self.ignored += 1,
            ApplyOutcome::Malformed(_) => self.malformed += 1,
            ApplyOutcome::OutOfOrder => self.out_of_order += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.duplicates + self.ignored + self.malformed + self.out_of_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cursor_admits_everything() {
        assert!(IndexCursor::from(None).admits(0, 0));
    }

    #[test]
    fn test_cursor_admits_strictly_after() {
        let cursor = IndexCursor::from(Some((10, 3)));
        assert!(!cursor.admits(10, 3));
        assert!(!cursor.admits(9, 99));
        assert!(cursor.admits(10, 4));
        assert!(cursor.admits(11, 0));
    }

    #[test]
    fn test_batch_summary_record() {
        let mut summary = BatchSummary::default();
        summary.record(&ApplyOutcome::Applied);
        summary.record(&ApplyOutcome::Applied);
        summary.record(&ApplyOutcome::Malformed("bad".to_string()));
        summary.record(&ApplyOutcome::Duplicate);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.total(), 4);
    }
}
