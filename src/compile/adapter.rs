//! Event-shape adapter: turns a normalizer `RawEvent` into a typed
//! `MarketEvent`.
//!
//! The two contract generations differ only in how the market id is scoped
//! and in a few parameter names, so they share one decoder driven by
//! [`EventShape`].

use crate::domain::event::{LIQUIDITY_CHANGED, SHARES_MINTED, SHARES_SWAPPED, WINNINGS_CLAIMED};
use crate::domain::{
    AccountId, BigAmount, ClaimEvent, EventKind, LiquidityEvent, MarketEvent, MarketId, MintEvent,
    OutcomeId, RawEvent, TradeEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{event}: missing parameter {name}")]
    MissingParameter { event: String, name: String },
    #[error("{event}: invalid parameter {name}: {value}")]
    InvalidParameter {
        event: String,
        name: String,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventShape {
    /// Factory-scoped markets: ids are `{contract}-{marketId}`.
    Current,
    /// Single-market contracts: the market id is used as emitted.
    Legacy,
}

impl EventShape {
    pub fn trade_account_param(&self) -> &'static str {
        match self {
            EventShape::Current => "user",
            EventShape::Legacy => "trader",
        }
    }

    pub fn mint_market_param(&self) -> &'static str {
        match self {
            EventShape::Current => "id",
            EventShape::Legacy => "marketId",
        }
    }

    pub fn market_id(&self, contract: &str, raw_market: &str) -> MarketId {
        match self {
            EventShape::Current => MarketId::new(format!("{}-{}", contract.trim(), raw_market.trim())),
            EventShape::Legacy => MarketId::new(raw_market),
        }
    }

    /// `Ok(None)` for event names the ledger does not track.
    pub fn decode(&self, raw: &RawEvent) -> Result<Option<MarketEvent>, DecodeError> {
        let params = Params {
            event: &raw.event_name,
            map: &raw.parameters,
        };

        let kind = match raw.event_name.as_str() {
            SHARES_SWAPPED => EventKind::Trade(TradeEvent {
                account: params.account(self.trade_account_param())?,
                market: self.market_id(&raw.contract_address, &params.text("marketId")?),
                outcome: params.outcome("outcomeIndex")?,
                collateral: params.amount("collateral")?,
                shares: params.amount("shares")?,
            }),
            LIQUIDITY_CHANGED => EventKind::Liquidity(LiquidityEvent {
                account: params.account("provider")?,
                market: self.market_id(&raw.contract_address, &params.text("marketId")?),
                collateral: params.amount("collateral")?,
                lp_tokens: params.amount_or_zero("lpTokens")?,
                shares_returned: params.amounts("sharesReturned")?,
            }),
            WINNINGS_CLAIMED => EventKind::Claim(ClaimEvent {
                account: params.account("user")?,
                market: self.market_id(&raw.contract_address, &params.text("marketId")?),
                winning_outcome: params.outcome("outcomeIndex")?,
                amount: params.amount("amount")?,
                payout: params.amount("payout")?,
                settlement_fee: params.amount_or_zero("settlementFee")?,
            }),
            SHARES_MINTED => EventKind::Mint(MintEvent {
                account: params.account("user")?,
                market: self.market_id(
                    &raw.contract_address,
                    &params.text(self.mint_market_param())?,
                ),
                amount: params.amount("amount")?,
            }),
            _ => return Ok(None),
        };

        Ok(Some(MarketEvent {
            id: raw.event_id(),
            block_number: raw.block_number,
            timestamp: raw.block_timestamp,
            kind,
        }))
    }
}

struct Params<'a> {
    event: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    fn get(&self, name: &str) -> Result<&'a Value, DecodeError> {
        match self.map.get(name) {
            Some(Value::Null) | None => Err(DecodeError::MissingParameter {
                event: self.event.to_string(),
                name: name.to_string(),
            }),
            Some(value) => Ok(value),
        }
    }

    fn invalid(&self, name: &str, value: &Value) -> DecodeError {
        DecodeError::InvalidParameter {
            event: self.event.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Strings are taken as-is; integers are rendered in decimal.
    fn text(&self, name: &str) -> Result<String, DecodeError> {
        let value = self.get(name)?;
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
            _ => Err(self.invalid(name, value)),
        }
    }

    fn account(&self, name: &str) -> Result<AccountId, DecodeError> {
        let value = self.get(name)?;
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(AccountId::new(s.as_str())),
            _ => Err(self.invalid(name, value)),
        }
    }

    fn outcome(&self, name: &str) -> Result<OutcomeId, DecodeError> {
        let value = self.get(name)?;
        let index = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        index
            .and_then(|i| u32::try_from(i).ok())
            .map(OutcomeId::new)
            .ok_or_else(|| self.invalid(name, value))
    }

    fn amount(&self, name: &str) -> Result<BigAmount, DecodeError> {
        let value = self.get(name)?;
        parse_amount(value).ok_or_else(|| self.invalid(name, value))
    }

    fn amount_or_zero(&self, name: &str) -> Result<BigAmount, DecodeError> {
        match self.map.get(name) {
            None | Some(Value::Null) => Ok(BigAmount::ZERO),
            Some(_) => self.amount(name),
        }
    }

    fn amounts(&self, name: &str) -> Result<Vec<BigAmount>, DecodeError> {
        let value = self.get(name)?;
        let items = value.as_array().ok_or_else(|| self.invalid(name, value))?;
        items
            .iter()
            .map(|item| parse_amount(item).ok_or_else(|| self.invalid(name, item)))
            .collect()
    }
}

/// Integer amount from a JSON number, a decimal string or a `0x` hex string.
pub fn parse_amount(value: &Value) -> Option<BigAmount> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .map(BigAmount::new),
        Value::String(s) => {
            let s = s.trim();
            let (negative, digits) = match s.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, s),
            };
            let magnitude = match digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
            {
                Some(hex) => i128::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<i128>().ok()?,
            };
            let signed = if negative {
                magnitude.checked_neg()?
            } else {
                magnitude
            };
            Some(BigAmount::new(signed))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockTime;
    use serde_json::json;

    fn raw(event_name: &str, parameters: Value) -> RawEvent {
        RawEvent {
            tx_hash: "0xABC".to_string(),
            log_index: 7,
            block_number: 42,
            block_timestamp: BlockTime::new(1_700_000_000),
            contract_address: "0xFactory".to_string(),
            event_name: event_name.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_current_trade_scopes_market_by_factory() {
        let event = raw(
            SHARES_SWAPPED,
            json!({
                "user": "0xUser",
                "marketId": "12",
                "outcomeIndex": 1,
                "collateral": "-50000000",
                "shares": "100000000000000000000"
            }),
        );
        let decoded = EventShape::Current.decode(&event).unwrap().unwrap();
        assert_eq!(decoded.id.key(), "0xabc-7");
        assert_eq!(decoded.block_number, 42);
        match decoded.kind {
            EventKind::Trade(trade) => {
                assert_eq!(trade.account, AccountId::new("0xuser"));
                assert_eq!(trade.market, MarketId::new("0xfactory-12"));
                assert_eq!(trade.outcome, OutcomeId::new(1));
                assert!(trade.is_buy());
                assert_eq!(trade.shares, BigAmount::new(100_000_000_000_000_000_000));
            }
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_trade_uses_trader_and_bare_market() {
        let event = raw(
            SHARES_SWAPPED,
            json!({
                "trader": "0xUser",
                "marketId": 12,
                "outcomeIndex": "0",
                "collateral": 10,
                "shares": -20
            }),
        );
        let decoded = EventShape::Legacy.decode(&event).unwrap().unwrap();
        assert_eq!(decoded.kind.market(), &MarketId::new("12"));
        assert_eq!(decoded.kind.account(), &AccountId::new("0xuser"));

        // The current shape reads `user`, which this payload lacks.
        assert!(matches!(
            EventShape::Current.decode(&event),
            Err(DecodeError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_mint_market_parameter_differs_by_shape() {
        let current = raw(SHARES_MINTED, json!({"user": "0xa", "id": "3", "amount": "5"}));
        let legacy = raw(SHARES_MINTED, json!({"user": "0xa", "marketId": "3", "amount": "5"}));

        let c = EventShape::Current.decode(&current).unwrap().unwrap();
        let l = EventShape::Legacy.decode(&legacy).unwrap().unwrap();
        assert_eq!(c.kind.market(), &MarketId::new("0xfactory-3"));
        assert_eq!(l.kind.market(), &MarketId::new("3"));
    }

    #[test]
    fn test_liquidity_shares_returned_array() {
        let event = raw(
            LIQUIDITY_CHANGED,
            json!({
                "provider": "0xlp",
                "marketId": "1",
                "collateral": "-30",
                "lpTokens": "30",
                "sharesReturned": ["0", "0x10", 5]
            }),
        );
        match EventShape::Current.decode(&event).unwrap().unwrap().kind {
            EventKind::Liquidity(liq) => {
                assert!(liq.is_add());
                assert_eq!(
                    liq.shares_returned,
                    vec![BigAmount::new(0), BigAmount::new(16), BigAmount::new(5)]
                );
            }
            other => panic!("expected liquidity, got {:?}", other),
        }
    }

    #[test]
    fn test_claim_settlement_fee_defaults_to_zero() {
        let event = raw(
            WINNINGS_CLAIMED,
            json!({"user": "0xa", "marketId": "1", "outcomeIndex": 2, "amount": "30", "payout": "30"}),
        );
        match EventShape::Current.decode(&event).unwrap().unwrap().kind {
            EventKind::Claim(claim) => {
                assert_eq!(claim.winning_outcome, OutcomeId::new(2));
                assert_eq!(claim.settlement_fee, BigAmount::ZERO);
            }
            other => panic!("expected claim, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_none() {
        let event = raw("OwnershipTransferred", json!({}));
        assert_eq!(EventShape::Current.decode(&event).unwrap(), None);
    }

    #[test]
    fn test_invalid_amount_is_rejected() {
        let event = raw(
            SHARES_SWAPPED,
            json!({"user": "0xa", "marketId": "1", "outcomeIndex": 0, "collateral": "abc", "shares": "1"}),
        );
        assert!(matches!(
            EventShape::Current.decode(&event),
            Err(DecodeError::InvalidParameter { ref name, .. }) if name == "collateral"
        ));
    }

    #[test]
    fn test_parse_amount_forms() {
        assert_eq!(parse_amount(&json!("-0x0a")), Some(BigAmount::new(-10)));
        assert_eq!(parse_amount(&json!(" 42 ")), Some(BigAmount::new(42)));
        assert_eq!(parse_amount(&json!(u64::MAX)), Some(BigAmount::new(u64::MAX as i128)));
        assert_eq!(parse_amount(&json!(1.5)), None);
        assert_eq!(parse_amount(&json!(true)), None);
    }
}
