//! Read-only market metadata: the outcome (share token) list of a market.
//!
//! Lookups are pure functions of the market, so results can be cached for the
//! life of the process. Failures are surfaced to the caller, which substitutes
//! an empty list.

use crate::domain::{MarketId, OutcomeId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait MarketMetadata: Send + Sync + fmt::Debug {
    /// Outcomes of `market`, in index order.
    async fn outcomes(&self, market: &MarketId) -> Result<Vec<OutcomeId>, MetadataError>;
}

#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}")]
    Http { status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown market {0}")]
    UnknownMarket(String),
    #[error("failed to read metadata file: {0}")]
    Io(String),
}

/// Accepts either a bare array of share tokens or an object carrying
/// `shareTokens` or `outcomeCount`.
pub fn outcomes_from_value(value: &serde_json::Value) -> Result<Vec<OutcomeId>, MetadataError> {
    let count = match value {
        serde_json::Value::Array(tokens) => tokens.len(),
        serde_json::Value::Object(map) => {
            if let Some(tokens) = map.get("shareTokens").and_then(|v| v.as_array()) {
                tokens.len()
            } else if let Some(n) = map.get("outcomeCount").and_then(|v| v.as_u64()) {
                n as usize
            } else {
                return Err(MetadataError::Parse(
                    "expected shareTokens or outcomeCount".to_string(),
                ));
            }
        }
        _ => return Err(MetadataError::Parse("expected array or object".to_string())),
    };
    let count = u32::try_from(count)
        .map_err(|_| MetadataError::Parse(format!("outcome count {} out of range", count)))?;
    Ok((0..count).map(OutcomeId::new).collect())
}

/// Used when no metadata source is configured: every market has no known
/// outcomes.
#[derive(Debug, Clone, Default)]
pub struct NoMarketMetadata;

#[async_trait]
impl MarketMetadata for NoMarketMetadata {
    async fn outcomes(&self, market: &MarketId) -> Result<Vec<OutcomeId>, MetadataError> {
        debug!(market = %market, "No metadata source configured");
        Ok(Vec::new())
    }
}

/// Metadata loaded once from a JSON object keyed by market id.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketMetadata {
    markets: HashMap<MarketId, Vec<OutcomeId>>,
}

impl StaticMarketMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(mut self, market: MarketId, outcome_count: u32) -> Self {
        self.markets
            .insert(market, (0..outcome_count).map(OutcomeId::new).collect());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| MetadataError::Parse(e.to_string()))?;
        let entries = value
            .as_object()
            .ok_or_else(|| MetadataError::Parse("expected object keyed by market".to_string()))?;

        let mut markets = HashMap::new();
        for (market, outcomes) in entries {
            markets.insert(MarketId::new(market.as_str()), outcomes_from_value(outcomes)?);
        }
        Ok(Self { markets })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MetadataError::Io(e.to_string()))?;
        Self::from_json(&content)
    }
}

#[async_trait]
impl MarketMetadata for StaticMarketMetadata {
    async fn outcomes(&self, market: &MarketId) -> Result<Vec<OutcomeId>, MetadataError> {
        self.markets
            .get(market)
            .cloned()
            .ok_or_else(|| MetadataError::UnknownMarket(market.to_string()))
    }
}

/// Metadata served over HTTP at `{base_url}/markets/{marketId}`.
#[derive(Debug, Clone)]
pub struct HttpMarketMetadata {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl HttpMarketMetadata {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    async fn get_market(&self, market: &MarketId) -> Result<serde_json::Value, MetadataError> {
        let url = format!("{}/markets/{}", self.base_url, market.as_str());
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(MetadataError::Network(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(MetadataError::Http {
                    status: status.as_u16(),
                }));
            }
            if status == 404 {
                return Err(backoff::Error::permanent(MetadataError::UnknownMarket(
                    market.to_string(),
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(MetadataError::Http {
                    status: status.as_u16(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(MetadataError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl MarketMetadata for HttpMarketMetadata {
    async fn outcomes(&self, market: &MarketId) -> Result<Vec<OutcomeId>, MetadataError> {
        debug!(market = %market, "Fetching market metadata");
        let value = self.get_market(market).await?;
        outcomes_from_value(&value)
    }
}

/// Process-local cache in front of another metadata source. Only successful
/// lookups are cached; failures are retried on the next call.
#[derive(Debug)]
pub struct CachedMarketMetadata {
    inner: Arc<dyn MarketMetadata>,
    cache: RwLock<HashMap<MarketId, Vec<OutcomeId>>>,
}

impl CachedMarketMetadata {
    pub fn new(inner: Arc<dyn MarketMetadata>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MarketMetadata for CachedMarketMetadata {
    async fn outcomes(&self, market: &MarketId) -> Result<Vec<OutcomeId>, MetadataError> {
        if let Some(hit) = self.cache.read().await.get(market) {
            return Ok(hit.clone());
        }
        let outcomes = self.inner.outcomes(market).await?;
        self.cache
            .write()
            .await
            .insert(market.clone(), outcomes.clone());
        Ok(outcomes)
    }
}
