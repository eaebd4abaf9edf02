//! Domain primitives: AccountId, MarketId, OutcomeId, EventId, BlockTime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block timestamp in seconds since Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockTime(pub i64);

impl BlockTime {
    pub fn new(secs: i64) -> Self {
        BlockTime(secs)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Account (wallet) address, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create an AccountId, lowercasing hex addresses.
    pub fn new(addr: impl Into<String>) -> Self {
        AccountId(addr.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Market identifier as composed by the event-shape adapter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketId(pub String);

impl MarketId {
    pub fn new(id: impl Into<String>) -> Self {
        MarketId(id.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome index within a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutcomeId(pub u32);

impl OutcomeId {
    pub fn new(index: u32) -> Self {
        OutcomeId(index)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OutcomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one emitted log: `{txHash}-{logIndex}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub tx_hash: String,
    pub log_index: u64,
}

impl EventId {
    pub fn new(tx_hash: impl Into<String>, log_index: u64) -> Self {
        EventId {
            tx_hash: tx_hash.into().trim().to_lowercase(),
            log_index,
        }
    }

    /// Journal key for this event.
    pub fn key(&self) -> String {
        format!("{}-{}", self.tx_hash, self.log_index)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tx_hash, self.log_index)
    }
}

/// Accumulator key for a per-outcome record.
pub fn position_key(account: &AccountId, market: &MarketId, outcome: OutcomeId) -> String {
    format!("{}-{}-{}", account, market, outcome)
}

/// Accumulator key for a market-level record.
pub fn account_market_key(account: &AccountId, market: &MarketId) -> String {
    format!("{}-{}", account, market)
}
