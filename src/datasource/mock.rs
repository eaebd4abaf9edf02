//! In-memory sources for tests.

use super::{EventSource, EventSourceError, MarketMetadata, MetadataError};
use crate::domain::{MarketId, OutcomeId, RawEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Event source that returns predefined events.
#[derive(Debug, Clone, Default)]
pub struct MockEventSource {
    events: Vec<RawEvent>,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: RawEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_events(mut self, events: Vec<RawEvent>) -> Self {
        self.events.extend(events);
        self
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_events(&self) -> Result<Vec<RawEvent>, EventSourceError> {
        Ok(self.events.clone())
    }
}

/// Metadata source with fixed outcome counts, an optional failure mode and a
/// call counter.
#[derive(Debug, Default)]
pub struct MockMarketMetadata {
    markets: HashMap<MarketId, u32>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockMarketMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(mut self, market: MarketId, outcome_count: u32) -> Self {
        self.markets.insert(market, outcome_count);
        self
    }

    /// Every lookup fails, as a reverted contract read would.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketMetadata for MockMarketMetadata {
    async fn outcomes(&self, market: &MarketId) -> Result<Vec<OutcomeId>, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MetadataError::Network("mock failure".to_string()));
        }
        self.markets
            .get(market)
            .map(|n| (0..*n).map(OutcomeId::new).collect())
            .ok_or_else(|| MetadataError::UnknownMarket(market.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockTime;

    #[tokio::test]
    async fn test_mock_event_source_returns_events() {
        let event = RawEvent {
            tx_hash: "0x1".to_string(),
            log_index: 0,
            block_number: 1,
            block_timestamp: BlockTime::new(0),
            contract_address: "0xf".to_string(),
            event_name: "SharesSwapped".to_string(),
            parameters: serde_json::Map::new(),
        };
        let source = MockEventSource::new().with_event(event.clone());
        assert_eq!(source.fetch_events().await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_mock_metadata_counts_calls() {
        let metadata = MockMarketMetadata::new().with_market(MarketId::new("m"), 3);
        assert_eq!(metadata.outcomes(&MarketId::new("m")).await.unwrap().len(), 3);
        assert!(metadata.outcomes(&MarketId::new("x")).await.is_err());
        assert_eq!(metadata.calls(), 2);
    }
}
