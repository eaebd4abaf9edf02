use crate::domain::{
    position_key, AccountId, BigAmount, BlockTime, ClaimEvent, Decimal, MarketId, OutcomeId,
    TradeEvent,
};
use serde::{Deserialize, Serialize};

use super::{
    magnitude, AccountingError, AccountingParams, CostBasis, Direction, LiquidityCredit, Touch,
};

/// Observable state of a stored position. Absence from the store is the
/// third, "nonexistent", state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Open,
    Closed,
}

/// Authoritative share balance for one (account, market, outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBalance {
    pub id: String,
    pub account: AccountId,
    pub market: MarketId,
    pub outcome: OutcomeId,
    pub shares_big_int: BigAmount,
    pub shares: Decimal,
    pub init_cost_usd_big_int: BigAmount,
    pub payout_big_int: BigAmount,
    pub realized_change: BigAmount,
    pub open: bool,
    pub has_claimed: bool,
    pub from_add_liquidity: bool,
    pub from_remove_liquidity: bool,
    pub timestamp: BlockTime,
    pub transaction_hash: String,
}

impl PositionBalance {
    pub fn new(account: AccountId, market: MarketId, outcome: OutcomeId) -> Self {
        Self {
            id: position_key(&account, &market, outcome),
            account,
            market,
            outcome,
            shares_big_int: BigAmount::ZERO,
            shares: Decimal::zero(),
            init_cost_usd_big_int: BigAmount::ZERO,
            payout_big_int: BigAmount::ZERO,
            realized_change: BigAmount::ZERO,
            open: false,
            has_claimed: false,
            from_add_liquidity: false,
            from_remove_liquidity: false,
            timestamp: BlockTime::default(),
            transaction_hash: String::new(),
        }
    }

    pub fn state(&self) -> PositionState {
        if self.open {
            PositionState::Open
        } else {
            PositionState::Closed
        }
    }

    /// Apply a swap. `cost_basis` must already include this trade.
    ///
    /// `settled_losing` pins the position closed once its market settled
    /// against this outcome.
    pub fn apply_trade_delta(
        &mut self,
        trade: &TradeEvent,
        cost_basis: &CostBasis,
        touch: &Touch,
        params: &AccountingParams,
        settled_losing: bool,
    ) -> Result<(), AccountingError> {
        let collateral = magnitude(trade.collateral, "collateral")?;
        let shares = magnitude(trade.shares, "shares")?;

        let mut next = self.clone();
        match Direction::from_collateral(trade.collateral) {
            Direction::Buy => {
                next.shares_big_int = self
                    .shares_big_int
                    .checked_add(shares)
                    .ok_or(AccountingError::Overflow("shares_big_int"))?;
                next.init_cost_usd_big_int = self
                    .init_cost_usd_big_int
                    .checked_add(collateral)
                    .ok_or(AccountingError::Overflow("init_cost_usd_big_int"))?;
            }
            Direction::Sell => {
                next.shares_big_int = self
                    .shares_big_int
                    .checked_sub(shares)
                    .ok_or(AccountingError::Overflow("shares_big_int"))?;
                next.payout_big_int = self
                    .payout_big_int
                    .checked_add(collateral)
                    .ok_or(AccountingError::Overflow("payout_big_int"))?;
                next.realized_change = next
                    .payout_big_int
                    .checked_sub(cost_basis.sum_of_initial_cost)
                    .ok_or(AccountingError::Overflow("realized_change"))?;
            }
        }
        next.refresh_open(params, settled_losing)?;
        next.stamp(touch);
        *self = next;
        Ok(())
    }

    /// Credit shares produced by a liquidity add or removal. Both sides are
    /// modeled as acquisitions; only the cost adjustment changes sign.
    pub fn apply_liquidity_delta(
        &mut self,
        credit: &LiquidityCredit,
        touch: &Touch,
        params: &AccountingParams,
        settled_losing: bool,
    ) -> Result<(), AccountingError> {
        let shares = magnitude(credit.shares, "shares_returned")?;
        let cost = credit
            .price
            .checked_mul(params.shares_decimal(shares)?)
            .ok_or(AccountingError::Overflow("liquidity cost"))?;
        let cost = params.collateral_base_units(cost)?;

        let mut next = self.clone();
        next.init_cost_usd_big_int = if credit.provenance.is_add() {
            self.init_cost_usd_big_int.checked_add(cost)
        } else {
            self.init_cost_usd_big_int.checked_sub(cost)
        }
        .ok_or(AccountingError::Overflow("init_cost_usd_big_int"))?;
        next.shares_big_int = self
            .shares_big_int
            .checked_add(shares)
            .ok_or(AccountingError::Overflow("shares_big_int"))?;
        if credit.provenance.is_add() {
            next.from_add_liquidity = true;
        } else {
            next.from_remove_liquidity = true;
        }
        next.refresh_open(params, settled_losing)?;
        next.stamp(touch);
        *self = next;
        Ok(())
    }

    /// Redeem winning shares.
    pub fn apply_claim(
        &mut self,
        claim: &ClaimEvent,
        cost_basis: Option<&CostBasis>,
        touch: &Touch,
        params: &AccountingParams,
    ) -> Result<(), AccountingError> {
        let amount = magnitude(claim.amount, "amount")?;
        let payout = magnitude(claim.payout, "payout")?;
        let basis = cost_basis
            .map(|cb| cb.sum_of_initial_cost)
            .unwrap_or(BigAmount::ZERO);

        let mut next = self.clone();
        next.shares_big_int = self
            .shares_big_int
            .checked_sub(amount)
            .ok_or(AccountingError::Overflow("shares_big_int"))?;
        next.payout_big_int = self
            .payout_big_int
            .checked_add(payout)
            .ok_or(AccountingError::Overflow("payout_big_int"))?;
        next.realized_change = next
            .payout_big_int
            .checked_sub(basis)
            .ok_or(AccountingError::Overflow("realized_change"))?;
        next.has_claimed = true;
        next.refresh_open(params, false)?;
        next.stamp(touch);
        *self = next;
        Ok(())
    }

    /// Credit a complete-set mint share and its slice of the collateral.
    pub fn apply_mint(
        &mut self,
        shares: BigAmount,
        cost: BigAmount,
        touch: &Touch,
        params: &AccountingParams,
        settled_losing: bool,
    ) -> Result<(), AccountingError> {
        let shares = magnitude(shares, "amount")?;
        let cost = magnitude(cost, "mint cost")?;

        let mut next = self.clone();
        next.shares_big_int = self
            .shares_big_int
            .checked_add(shares)
            .ok_or(AccountingError::Overflow("shares_big_int"))?;
        next.init_cost_usd_big_int = self
            .init_cost_usd_big_int
            .checked_add(cost)
            .ok_or(AccountingError::Overflow("init_cost_usd_big_int"))?;
        next.refresh_open(params, settled_losing)?;
        next.stamp(touch);
        *self = next;
        Ok(())
    }

    /// Settlement sweep: a sibling of the claimed outcome is closed for good.
    pub fn close_for_settlement(&mut self, touch: &Touch) {
        self.open = false;
        self.stamp(touch);
    }

    fn refresh_open(
        &mut self,
        params: &AccountingParams,
        settled_losing: bool,
    ) -> Result<(), AccountingError> {
        self.shares = params.shares_decimal(self.shares_big_int)?;
        self.open = !settled_losing && params.exceeds_dust(self.shares);
        Ok(())
    }

    fn stamp(&mut self, touch: &Touch) {
        self.timestamp = touch.timestamp;
        self.transaction_hash = touch.transaction_hash.clone();
    }
}

/// Collateral attributed to each outcome of a complete-set mint of `amount`
/// shares across `outcome_count` outcomes, at one collateral unit per set.
pub fn mint_cost_per_outcome(
    amount: BigAmount,
    outcome_count: usize,
    params: &AccountingParams,
) -> Result<Option<BigAmount>, AccountingError> {
    if outcome_count == 0 {
        return Ok(None);
    }
    let sets = params.shares_decimal(magnitude(amount, "amount")?)?;
    match sets.checked_div(Decimal::from(outcome_count as u32)) {
        Some(per_outcome) => params.collateral_base_units(per_outcome).map(Some),
        None => Ok(None),
    }
}
