//! Pure accounting engine: accumulator structs and their transitions.
//!
//! Nothing here touches storage. Handlers load entities, call these
//! transitions, and write the results back.

use crate::domain::{BigAmount, BlockTime, Decimal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cost_basis;
pub mod liquidity;
pub mod position_balance;

pub use cost_basis::{BasisUpdate, CostBasis, WeightedBasis};
pub use liquidity::{LiquidityCredit, LiquidityPosition, LiquidityProvenance};
pub use position_balance::{mint_cost_per_outcome, PositionBalance, PositionState};

/// Default dust threshold in share units.
pub const DEFAULT_DUST_THRESHOLD: &str = "0.0001";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
    #[error("integer overflow while updating {0}")]
    Overflow(&'static str),
    #[error("amount {0} cannot be represented as a decimal")]
    Conversion(BigAmount),
}

/// Token precision and dust configuration shared by every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountingParams {
    pub share_decimals: u32,
    pub collateral_decimals: u32,
    pub dust_threshold: Decimal,
}

impl Default for AccountingParams {
    fn default() -> Self {
        Self {
            share_decimals: 18,
            collateral_decimals: 6,
            dust_threshold: Decimal::new(rust_decimal::Decimal::new(1, 4)),
        }
    }
}

impl AccountingParams {
    pub fn shares_decimal(&self, amount: BigAmount) -> Result<Decimal, AccountingError> {
        amount
            .to_decimal(self.share_decimals)
            .ok_or(AccountingError::Conversion(amount))
    }

    pub fn collateral_decimal(&self, amount: BigAmount) -> Result<Decimal, AccountingError> {
        amount
            .to_decimal(self.collateral_decimals)
            .ok_or(AccountingError::Conversion(amount))
    }

    pub fn collateral_base_units(&self, value: Decimal) -> Result<BigAmount, AccountingError> {
        value
            .to_base_units(self.collateral_decimals)
            .map(BigAmount::new)
            .ok_or(AccountingError::Overflow("collateral"))
    }

    /// Strict comparison: a quantity exactly at the threshold is dust.
    pub fn exceeds_dust(&self, shares: Decimal) -> bool {
        shares > self.dust_threshold
    }
}

/// Last-touch provenance stamped onto entities by each event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Touch {
    pub timestamp: BlockTime,
    pub transaction_hash: String,
}

/// Absolute value of a signed event parameter.
pub(crate) fn magnitude(amount: BigAmount, field: &'static str) -> Result<BigAmount, AccountingError> {
    amount.checked_abs().ok_or(AccountingError::Overflow(field))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Sign convention of swap events: negative collateral is a buy.
    pub fn from_collateral(collateral: BigAmount) -> Self {
        if collateral.is_negative() {
            Direction::Buy
        } else {
            Direction::Sell
        }
    }
}
