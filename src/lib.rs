pub mod compile;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use compile::{ApplyOutcome, BatchSummary, EventShape, IndexCursor, Indexer};
pub use config::{Config, MetadataSource};
pub use datasource::{
    CachedMarketMetadata, EventSource, EventSourceError, HttpMarketMetadata,
    JsonLinesEventSource, MarketMetadata, MetadataError, MockEventSource, MockMarketMetadata,
    NoMarketMetadata, StaticMarketMetadata,
};
pub use db::{init_db, Repository, RollbackSummary};
pub use domain::{
    AccountId, BigAmount, BlockTime, Decimal, EventId, MarketEvent, MarketId, OutcomeId, RawEvent,
};
pub use engine::{AccountingParams, CostBasis, LiquidityPosition, PositionBalance};
pub use error::IndexerError;
pub use orchestration::{Orchestrator, ReplaySummary};
