use crate::config::ConfigError;
use crate::datasource::{EventSourceError, MetadataError};
use crate::db::StoreError;
use thiserror::Error;

/// Failures that stop a replay. Per-event problems never surface here; they
/// are journaled and the stream continues.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Event source error: {0}")]
    EventSource(#[from] EventSourceError),
    #[error("Market metadata error: {0}")]
    Metadata(#[from] MetadataError),
}
