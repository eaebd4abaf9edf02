//! Table bindings for each stored record type.

use crate::domain::{Account, Market};
use crate::engine::{CostBasis, LiquidityPosition, PositionBalance};

use super::{Entity, EntityTable};

impl Entity for Account {
    const TABLE: EntityTable = EntityTable::Accounts;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn account_scope(&self) -> Option<&str> {
        Some(self.id.as_str())
    }
}

impl Entity for Market {
    const TABLE: EntityTable = EntityTable::Markets;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn market_scope(&self) -> Option<&str> {
        Some(self.id.as_str())
    }
}

impl Entity for PositionBalance {
    const TABLE: EntityTable = EntityTable::PositionBalances;

    fn id(&self) -> &str {
        &self.id
    }

    fn account_scope(&self) -> Option<&str> {
        Some(self.account.as_str())
    }

    fn market_scope(&self) -> Option<&str> {
        Some(self.market.as_str())
    }
}

impl Entity for CostBasis {
    const TABLE: EntityTable = EntityTable::CostBases;

    fn id(&self) -> &str {
        &self.id
    }

    fn account_scope(&self) -> Option<&str> {
        Some(self.account.as_str())
    }

    fn market_scope(&self) -> Option<&str> {
        Some(self.market.as_str())
    }
}

impl Entity for LiquidityPosition {
    const TABLE: EntityTable = EntityTable::LiquidityPositions;

    fn id(&self) -> &str {
        &self.id
    }

    fn account_scope(&self) -> Option<&str> {
        Some(self.account.as_str())
    }

    fn market_scope(&self) -> Option<&str> {
        Some(self.market.as_str())
    }
}
