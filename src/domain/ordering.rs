//! Stable event ordering for deterministic processing.

use crate::domain::RawEvent;

/// Stable ordering key for events.
///
/// Ordering: block_number -> log_index -> tx_hash.
/// Log indices are unique within a block, so the tx hash only breaks ties in
/// malformed input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventOrderingKey {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
}

impl EventOrderingKey {
    pub fn from_raw(event: &RawEvent) -> Self {
        EventOrderingKey {
            block_number: event.block_number,
            log_index: event.log_index,
            tx_hash: event.tx_hash.to_lowercase(),
        }
    }
}

/// Sort raw events into emission order.
pub fn sort_events_deterministic(events: &mut [RawEvent]) {
    events.sort_by_cached_key(EventOrderingKey::from_raw);
}
