//! Inputs to the indexer: ordered raw events and read-only market metadata.

use crate::domain::RawEvent;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod file;
pub mod metadata;
pub mod mock;

pub use file::JsonLinesEventSource;
pub use metadata::{
    CachedMarketMetadata, HttpMarketMetadata, MarketMetadata, MetadataError, NoMarketMetadata,
    StaticMarketMetadata,
};
pub use mock::{MockEventSource, MockMarketMetadata};

/// Source of normalized chain events.
///
/// Implementations return events in any order; the indexer sorts them by
/// (block_number, log_index, tx_hash) before applying.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    async fn fetch_events(&self) -> Result<Vec<RawEvent>, EventSourceError>;
}

#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("failed to read event log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("lz4 decode error: {0}")]
    Lz4(String),
}
