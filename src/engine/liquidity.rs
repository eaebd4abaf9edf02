use crate::domain::{account_market_key, AccountId, BigAmount, Decimal, MarketId, OutcomeId};
use serde::{Deserialize, Serialize};

use super::{magnitude, AccountingError, AccountingParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityProvenance {
    AddLiquidity,
    RemoveLiquidity,
}

impl LiquidityProvenance {
    pub fn is_add(&self) -> bool {
        matches!(self, LiquidityProvenance::AddLiquidity)
    }
}

/// Shares credited to one outcome by a liquidity operation, with the price
/// the operation attributes to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityCredit {
    pub outcome: OutcomeId,
    pub shares: BigAmount,
    pub price: Decimal,
    pub provenance: LiquidityProvenance,
}

/// Market-making stake of one account in one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub id: String,
    pub account: AccountId,
    pub market: MarketId,
    pub add_collateral: BigAmount,
    pub remove_collateral: BigAmount,
    /// From the most recent liquidity operation.
    pub shares_returned_per_outcome: Vec<BigAmount>,
    /// From the most recent liquidity operation.
    pub avg_price_per_outcome: Vec<Decimal>,
}

impl LiquidityPosition {
    pub fn new(account: AccountId, market: MarketId) -> Self {
        Self {
            id: account_market_key(&account, &market),
            account,
            market,
            add_collateral: BigAmount::ZERO,
            remove_collateral: BigAmount::ZERO,
            shares_returned_per_outcome: Vec::new(),
            avg_price_per_outcome: Vec::new(),
        }
    }

    /// Record collateral paid in. The cost is spread uniformly by share count
    /// across all returned shares, not by per-outcome pool weight.
    pub fn record_add_liquidity(
        &mut self,
        collateral_in: BigAmount,
        shares_returned: &[BigAmount],
        params: &AccountingParams,
    ) -> Result<Vec<LiquidityCredit>, AccountingError> {
        let collateral_in = magnitude(collateral_in, "collateral")?;
        let returned = magnitudes(shares_returned)?;

        let new_add = self
            .add_collateral
            .checked_add(collateral_in)
            .ok_or(AccountingError::Overflow("add_collateral"))?;

        let total = returned
            .iter()
            .try_fold(BigAmount::ZERO, |acc, s| acc.checked_add(*s))
            .ok_or(AccountingError::Overflow("shares_returned"))?;
        let total_decimal = params.shares_decimal(total)?;
        let per_share = if total_decimal.is_positive() {
            params
                .collateral_decimal(collateral_in)?
                .checked_div(total_decimal)
        } else {
            None
        };

        let mut credits = Vec::new();
        let mut prices = vec![Decimal::zero(); returned.len()];
        if let Some(price) = per_share {
            for (index, shares) in returned.iter().enumerate() {
                if params.exceeds_dust(params.shares_decimal(*shares)?) {
                    prices[index] = price;
                    credits.push(LiquidityCredit {
                        outcome: OutcomeId::new(index as u32),
                        shares: *shares,
                        price,
                        provenance: LiquidityProvenance::AddLiquidity,
                    });
                }
            }
        }

        self.add_collateral = new_add;
        self.shares_returned_per_outcome = returned;
        self.avg_price_per_outcome = prices;
        Ok(credits)
    }

    /// Record collateral withdrawn. Net liquidity P&L is amortized evenly over
    /// the outcomes that kept a residual position; a balanced removal credits
    /// nothing.
    pub fn record_remove_liquidity(
        &mut self,
        collateral_out: BigAmount,
        shares_returned: &[BigAmount],
        params: &AccountingParams,
    ) -> Result<Vec<LiquidityCredit>, AccountingError> {
        let collateral_out = magnitude(collateral_out, "collateral")?;
        let returned = magnitudes(shares_returned)?;

        let new_remove = self
            .remove_collateral
            .checked_add(collateral_out)
            .ok_or(AccountingError::Overflow("remove_collateral"))?;

        let mut residual = Vec::new();
        for (index, shares) in returned.iter().enumerate() {
            if params.exceeds_dust(params.shares_decimal(*shares)?) {
                residual.push(index);
            }
        }

        let mut credits = Vec::new();
        let mut prices = vec![Decimal::zero(); returned.len()];
        if !residual.is_empty() {
            let net = self
                .add_collateral
                .checked_sub(new_remove)
                .ok_or(AccountingError::Overflow("net liquidity"))?;
            let net_decimal = params.collateral_decimal(net)?;
            if let Some(price) = net_decimal.checked_div(Decimal::from(residual.len() as u32)) {
                for index in residual {
                    prices[index] = price;
                    credits.push(LiquidityCredit {
                        outcome: OutcomeId::new(index as u32),
                        shares: returned[index],
                        price,
                        provenance: LiquidityProvenance::RemoveLiquidity,
                    });
                }
            }
        }

        self.remove_collateral = new_remove;
        self.shares_returned_per_outcome = returned;
        self.avg_price_per_outcome = prices;
        Ok(credits)
    }
}

fn magnitudes(amounts: &[BigAmount]) -> Result<Vec<BigAmount>, AccountingError> {
    amounts
        .iter()
        .map(|a| magnitude(*a, "shares_returned"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARE: i128 = 1_000_000_000_000_000_000;
    const USDC: i128 = 1_000_000;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn position() -> LiquidityPosition {
        LiquidityPosition::new(AccountId::new("0xlp"), MarketId::new("m"))
    }

    #[test]
    fn test_add_spreads_cost_by_share_count() {
        let params = AccountingParams::default();
        let mut lp = position();
        let credits = lp
            .record_add_liquidity(
                BigAmount::new(-30 * USDC),
                &[BigAmount::new(0), BigAmount::new(40 * SHARE), BigAmount::new(20 * SHARE)],
                &params,
            )
            .unwrap();

        assert_eq!(lp.add_collateral, BigAmount::new(30 * USDC));
        assert_eq!(credits.len(), 2);
        assert_eq!(credits[0].outcome, OutcomeId::new(1));
        assert_eq!(credits[0].price, d("0.5"));
        assert_eq!(credits[1].outcome, OutcomeId::new(2));
        assert_eq!(credits[1].price, d("0.5"));
        assert_eq!(lp.avg_price_per_outcome, vec![d("0"), d("0.5"), d("0.5")]);
    }

    #[test]
    fn test_add_with_no_returned_shares_only_counts_collateral() {
        let params = AccountingParams::default();
        let mut lp = position();
        let credits = lp
            .record_add_liquidity(
                BigAmount::new(-10 * USDC),
                &[BigAmount::ZERO, BigAmount::ZERO],
                &params,
            )
            .unwrap();
        assert!(credits.is_empty());
        assert_eq!(lp.add_collateral, BigAmount::new(10 * USDC));
    }

    #[test]
    fn test_remove_splits_net_evenly() {
        let params = AccountingParams::default();
        let mut lp = position();
        lp.record_add_liquidity(BigAmount::new(-100 * USDC), &[], &params)
            .unwrap();

        let credits = lp
            .record_remove_liquidity(
                BigAmount::new(60 * USDC),
                &[BigAmount::new(5 * SHARE), BigAmount::ZERO, BigAmount::new(SHARE)],
                &params,
            )
            .unwrap();

        assert_eq!(lp.remove_collateral, BigAmount::new(60 * USDC));
        assert_eq!(credits.len(), 2);
        assert!(credits.iter().all(|c| c.price == d("20")));
        assert!(credits
            .iter()
            .all(|c| c.provenance == LiquidityProvenance::RemoveLiquidity));
    }

    #[test]
    fn test_balanced_remove_credits_nothing() {
        let params = AccountingParams::default();
        let mut lp = position();
        let credits = lp
            .record_remove_liquidity(
                BigAmount::new(10 * USDC),
                &[BigAmount::ZERO, BigAmount::new(50_000_000_000_000)],
                &params,
            )
            .unwrap();
        assert!(credits.is_empty());
        assert_eq!(lp.remove_collateral, BigAmount::new(10 * USDC));
    }
}
