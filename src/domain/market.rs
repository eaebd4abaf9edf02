//! Existence markers for markets and accounts.

use crate::domain::{AccountId, BlockTime, MarketId, OutcomeId};
use serde::{Deserialize, Serialize};

/// A market seen in the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub created_at: BlockTime,
    /// Set by the first claim; losing outcomes stay closed afterwards.
    pub winning_outcome: Option<OutcomeId>,
}

impl Market {
    pub fn new(id: MarketId, created_at: BlockTime) -> Self {
        Self {
            id,
            created_at,
            winning_outcome: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.winning_outcome.is_some()
    }

    /// True when the market settled and `outcome` was not the winner.
    pub fn is_losing(&self, outcome: OutcomeId) -> bool {
        matches!(self.winning_outcome, Some(w) if w != outcome)
    }
}

/// An account seen in the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub created_at: BlockTime,
}

impl Account {
    pub fn new(id: AccountId, created_at: BlockTime) -> Self {
        Self { id, created_at }
    }
}
