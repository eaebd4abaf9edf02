//! Domain types and determinism layer for the position ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper and BigAmount base units
//! - Domain primitives: AccountId, MarketId, OutcomeId, EventId, BlockTime
//! - Raw and typed chain events
//! - Stable event ordering key helper for deterministic processing

pub mod amount;
pub mod decimal;
pub mod event;
pub mod market;
pub mod ordering;
pub mod primitives;

pub use amount::BigAmount;
pub use decimal::Decimal;
pub use event::{
    ClaimEvent, EventKind, LiquidityEvent, MarketEvent, MintEvent, RawEvent, TradeEvent,
};
pub use market::{Account, Market};
pub use ordering::{sort_events_deterministic, EventOrderingKey};
pub use primitives::{
    account_market_key, position_key, AccountId, BlockTime, EventId, MarketId, OutcomeId,
};
