use crate::domain::{position_key, AccountId, BigAmount, Decimal, MarketId, OutcomeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{magnitude, AccountingError, AccountingParams, Direction};

/// A (quantity, total cost) pair. Merging adds both sides, so the combined
/// average `(q1·p1 + q2·p2) / (q1 + q2)` does not depend on merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeightedBasis {
    pub quantity: Decimal,
    pub cost: Decimal,
}

impl WeightedBasis {
    pub fn from_price(quantity: Decimal, avg_price: Decimal) -> Option<Self> {
        Some(Self {
            quantity,
            cost: quantity.checked_mul(avg_price)?,
        })
    }

    pub fn merge(self, other: WeightedBasis) -> Option<WeightedBasis> {
        Some(WeightedBasis {
            quantity: self.quantity.checked_add(other.quantity)?,
            cost: self.cost.checked_add(other.cost)?,
        })
    }

    /// `None` unless the quantity is strictly positive.
    pub fn avg_price(&self) -> Option<Decimal> {
        if !self.quantity.is_positive() {
            return None;
        }
        self.cost.checked_div(self.quantity)
    }
}

/// Outcome of applying one trade to a cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisUpdate {
    /// Cost and average price were recomputed.
    Updated,
    /// Holdings fell to dust; cost and average price were left as they were.
    Liquidated,
}

/// Trade-derived cost basis for one (account, market, outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasis {
    pub id: String,
    pub account: AccountId,
    pub market: MarketId,
    pub outcome: OutcomeId,
    pub sum_of_initial_cost: BigAmount,
    pub shares_from_trades: BigAmount,
    pub sum_of_initial_cost_decimal: Decimal,
    pub shares_from_trades_decimal: Decimal,
    pub avg_price: Decimal,
}

impl CostBasis {
    pub fn new(account: AccountId, market: MarketId, outcome: OutcomeId) -> Self {
        Self {
            id: position_key(&account, &market, outcome),
            account,
            market,
            outcome,
            sum_of_initial_cost: BigAmount::ZERO,
            shares_from_trades: BigAmount::ZERO,
            sum_of_initial_cost_decimal: Decimal::zero(),
            shares_from_trades_decimal: Decimal::zero(),
            avg_price: Decimal::zero(),
        }
    }

    /// Apply a swap. Negative collateral is a buy.
    ///
    /// A trade that leaves the position at or below dust only moves the share
    /// count; the cost and average survive so a full exit does not collapse
    /// the average toward zero.
    pub fn apply_trade(
        &mut self,
        signed_collateral: BigAmount,
        signed_shares: BigAmount,
        params: &AccountingParams,
    ) -> Result<BasisUpdate, AccountingError> {
        let collateral = magnitude(signed_collateral, "collateral")?;
        let shares = magnitude(signed_shares, "shares")?;
        let direction = Direction::from_collateral(signed_collateral);

        let new_shares = match direction {
            Direction::Buy => self.shares_from_trades.checked_add(shares),
            Direction::Sell => self.shares_from_trades.checked_sub(shares),
        }
        .ok_or(AccountingError::Overflow("shares_from_trades"))?;
        let new_shares_decimal = params.shares_decimal(new_shares)?;

        if !params.exceeds_dust(new_shares_decimal) {
            self.shares_from_trades = new_shares;
            self.shares_from_trades_decimal = new_shares_decimal;
            return Ok(BasisUpdate::Liquidated);
        }

        let new_sum = match direction {
            Direction::Buy => self.sum_of_initial_cost.checked_add(collateral),
            Direction::Sell => self.sum_of_initial_cost.checked_sub(collateral),
        }
        .ok_or(AccountingError::Overflow("sum_of_initial_cost"))?;
        let new_sum_decimal = params.collateral_decimal(new_sum)?;

        self.shares_from_trades = new_shares;
        self.shares_from_trades_decimal = new_shares_decimal;
        self.sum_of_initial_cost = new_sum;
        self.sum_of_initial_cost_decimal = new_sum_decimal;

        if new_shares_decimal.is_positive() {
            if let Some(avg) = new_sum_decimal.checked_div(new_shares_decimal) {
                self.avg_price = avg;
            }
        } else {
            debug!(id = %self.id, "non-positive share denominator, keeping avg_price");
        }

        Ok(BasisUpdate::Updated)
    }

    /// Fold liquidity-origin shares into the trade-side basis.
    ///
    /// Runs only when both sides hold a strictly positive quantity. Returns
    /// whether the merge happened.
    pub fn merge_liquidity_basis(
        &mut self,
        liquidity_shares: BigAmount,
        liquidity_avg_price: Decimal,
        params: &AccountingParams,
    ) -> Result<bool, AccountingError> {
        if !self.shares_from_trades.is_positive() || !liquidity_shares.is_positive() {
            return Ok(false);
        }

        let trade_side =
            WeightedBasis::from_price(self.shares_from_trades_decimal, self.avg_price)
                .ok_or(AccountingError::Overflow("trade basis"))?;
        let liquidity_side = WeightedBasis::from_price(
            params.shares_decimal(liquidity_shares)?,
            liquidity_avg_price,
        )
        .ok_or(AccountingError::Overflow("liquidity basis"))?;
        let combined = trade_side
            .merge(liquidity_side)
            .ok_or(AccountingError::Overflow("combined basis"))?;

        let new_shares = self
            .shares_from_trades
            .checked_add(liquidity_shares)
            .ok_or(AccountingError::Overflow("shares_from_trades"))?;
        let new_sum = params.collateral_base_units(combined.cost)?;

        self.shares_from_trades = new_shares;
        self.shares_from_trades_decimal = combined.quantity;
        self.sum_of_initial_cost = new_sum;
        self.sum_of_initial_cost_decimal = combined.cost;
        if let Some(avg) = combined.avg_price() {
            self.avg_price = avg;
        }

        Ok(true)
    }
}
