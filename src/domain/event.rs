//! Decoded chain events: the normalizer's raw record and the typed variant.

use crate::domain::{AccountId, BigAmount, BlockTime, EventId, MarketId, OutcomeId};
use serde::{Deserialize, Serialize};

pub const SHARES_SWAPPED: &str = "SharesSwapped";
pub const LIQUIDITY_CHANGED: &str = "LiquidityChanged";
pub const WINNINGS_CLAIMED: &str = "WinningsClaimed";
pub const SHARES_MINTED: &str = "SharesMinted";

/// A decoded log as produced by the external event normalizer.
///
/// Parameters are a loosely-typed bag; the event-shape adapter turns them into
/// a [`MarketEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub tx_hash: String,
    pub log_index: u64,
    pub block_number: u64,
    pub block_timestamp: BlockTime,
    pub contract_address: String,
    pub event_name: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl RawEvent {
    pub fn event_id(&self) -> EventId {
        EventId::new(&self.tx_hash, self.log_index)
    }
}

/// A typed event ready for the accounting core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketEvent {
    pub id: EventId,
    pub block_number: u64,
    pub timestamp: BlockTime,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Trade(TradeEvent),
    Liquidity(LiquidityEvent),
    Claim(ClaimEvent),
    Mint(MintEvent),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Trade(_) => SHARES_SWAPPED,
            EventKind::Liquidity(_) => LIQUIDITY_CHANGED,
            EventKind::Claim(_) => WINNINGS_CLAIMED,
            EventKind::Mint(_) => SHARES_MINTED,
        }
    }

    pub fn account(&self) -> &AccountId {
        match self {
            EventKind::Trade(e) => &e.account,
            EventKind::Liquidity(e) => &e.account,
            EventKind::Claim(e) => &e.account,
            EventKind::Mint(e) => &e.account,
        }
    }

    pub fn market(&self) -> &MarketId {
        match self {
            EventKind::Trade(e) => &e.market,
            EventKind::Liquidity(e) => &e.market,
            EventKind::Claim(e) => &e.market,
            EventKind::Mint(e) => &e.market,
        }
    }
}

/// An AMM swap. Negative collateral means the account paid in (a buy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub account: AccountId,
    pub market: MarketId,
    pub outcome: OutcomeId,
    pub collateral: BigAmount,
    pub shares: BigAmount,
}

impl TradeEvent {
    pub fn is_buy(&self) -> bool {
        self.collateral.is_negative()
    }
}

/// A liquidity add or removal. Negative collateral means liquidity was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityEvent {
    pub account: AccountId,
    pub market: MarketId,
    pub collateral: BigAmount,
    pub lp_tokens: BigAmount,
    pub shares_returned: Vec<BigAmount>,
}

impl LiquidityEvent {
    pub fn is_add(&self) -> bool {
        self.collateral.is_negative()
    }
}

/// Redemption of winning shares after settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimEvent {
    pub account: AccountId,
    pub market: MarketId,
    pub winning_outcome: OutcomeId,
    pub amount: BigAmount,
    pub payout: BigAmount,
    pub settlement_fee: BigAmount,
}

/// Complete-set mint: `amount` shares of every outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintEvent {
    pub account: AccountId,
    pub market: MarketId,
    pub amount: BigAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_event_deserializes_camel_case() {
        let json = r#"{
            "txHash": "0xABC",
            "logIndex": 3,
            "blockNumber": 100,
            "blockTimestamp": 1700000000,
            "contractAddress": "0xfactory",
            "eventName": "SharesSwapped",
            "parameters": {"marketId": "1"}
        }"#;
        let raw: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(raw.event_id().key(), "0xabc-3");
        assert_eq!(raw.block_timestamp, BlockTime::new(1_700_000_000));
        assert_eq!(raw.parameters["marketId"], "1");
    }

    #[test]
    fn test_trade_direction() {
        let trade = TradeEvent {
            account: AccountId::new("0x1"),
            market: MarketId::new("m"),
            outcome: OutcomeId::new(0),
            collateral: BigAmount::new(-10),
            shares: BigAmount::new(20),
        };
        assert!(trade.is_buy());
    }
}
