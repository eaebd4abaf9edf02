//! Per-event handlers: load accumulators through the event's unit of work,
//! run the pure transitions, write the results back.

use crate::datasource::MarketMetadata;
use crate::db::{EntityTx, StoreError};
use crate::domain::{
    account_market_key, position_key, Account, AccountId, BlockTime, ClaimEvent, EventKind,
    LiquidityEvent, Market, MarketEvent, MarketId, MintEvent, OutcomeId, TradeEvent,
};
use crate::engine::{
    mint_cost_per_outcome, AccountingError, AccountingParams, CostBasis, LiquidityPosition,
    PositionBalance, Touch,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Accounting(#[from] AccountingError),
}

pub struct HandlerContext<'a> {
    pub params: &'a AccountingParams,
    pub metadata: &'a dyn MarketMetadata,
}

impl HandlerContext<'_> {
    /// Outcome list of a market, or empty when the lookup fails.
    pub async fn outcomes_or_empty(&self, market: &MarketId) -> Vec<OutcomeId> {
        match self.metadata.outcomes(market).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(market = %market, error = %e, "Market metadata unavailable, using empty outcome list");
                Vec::new()
            }
        }
    }
}

pub async fn apply_event(
    tx: &mut EntityTx,
    ctx: &HandlerContext<'_>,
    event: &MarketEvent,
) -> Result<(), HandlerError> {
    let touch = Touch {
        timestamp: event.timestamp,
        transaction_hash: event.id.tx_hash.clone(),
    };
    match &event.kind {
        EventKind::Trade(trade) => handle_trade(tx, ctx, trade, &touch).await,
        EventKind::Liquidity(liquidity) => handle_liquidity(tx, ctx, liquidity, &touch).await,
        EventKind::Claim(claim) => handle_claim(tx, ctx, claim, &touch).await,
        EventKind::Mint(mint) => handle_mint(tx, ctx, mint, &touch).await,
    }
}

/// Lazily create the account and market markers.
async fn ensure_subjects(
    tx: &mut EntityTx,
    account: &AccountId,
    market: &MarketId,
    timestamp: BlockTime,
) -> Result<Market, StoreError> {
    tx.get_or_create(account.as_str(), || Account::new(account.clone(), timestamp))
        .await
        .map(|_: Account| ())?;
    tx.get_or_create(market.as_str(), || Market::new(market.clone(), timestamp))
        .await
}

async fn load_position(
    tx: &mut EntityTx,
    account: &AccountId,
    market: &MarketId,
    outcome: OutcomeId,
) -> Result<PositionBalance, StoreError> {
    let key = position_key(account, market, outcome);
    tx.get_or_create(&key, || {
        PositionBalance::new(account.clone(), market.clone(), outcome)
    })
    .await
}

pub async fn handle_trade(
    tx: &mut EntityTx,
    ctx: &HandlerContext<'_>,
    trade: &TradeEvent,
    touch: &Touch,
) -> Result<(), HandlerError> {
    let market = ensure_subjects(tx, &trade.account, &trade.market, touch.timestamp).await?;

    let key = position_key(&trade.account, &trade.market, trade.outcome);
    let mut cost_basis: CostBasis = tx
        .get_or_create(&key, || {
            CostBasis::new(trade.account.clone(), trade.market.clone(), trade.outcome)
        })
        .await?;
    cost_basis.apply_trade(trade.collateral, trade.shares, ctx.params)?;

    let mut position = load_position(tx, &trade.account, &trade.market, trade.outcome).await?;
    let before = position.state();
    position.apply_trade_delta(
        trade,
        &cost_basis,
        touch,
        ctx.params,
        market.is_losing(trade.outcome),
    )?;

    tx.put(&cost_basis).await?;
    tx.put(&position).await?;

    debug!(
        account = %trade.account,
        market = %trade.market,
        outcome = %trade.outcome,
        shares = %position.shares,
        avg_price = %cost_basis.avg_price,
        "Applied trade"
    );
    if position.state() != before {
        debug!(
            position = %position.id,
            from = ?before,
            to = ?position.state(),
            "Position state changed"
        );
    }
    Ok(())
}

pub async fn handle_liquidity(
    tx: &mut EntityTx,
    ctx: &HandlerContext<'_>,
    event: &LiquidityEvent,
    touch: &Touch,
) -> Result<(), HandlerError> {
    let market = ensure_subjects(tx, &event.account, &event.market, touch.timestamp).await?;

    let key = account_market_key(&event.account, &event.market);
    let mut liquidity: LiquidityPosition = tx
        .get_or_create(&key, || {
            LiquidityPosition::new(event.account.clone(), event.market.clone())
        })
        .await?;
    let credits = if event.is_add() {
        liquidity.record_add_liquidity(event.collateral, &event.shares_returned, ctx.params)?
    } else {
        liquidity.record_remove_liquidity(event.collateral, &event.shares_returned, ctx.params)?
    };
    tx.put(&liquidity).await?;

    debug!(
        account = %event.account,
        market = %event.market,
        add = event.is_add(),
        collateral = %event.collateral,
        lp_tokens = %event.lp_tokens,
        credited = credits.len(),
        "Applied liquidity change"
    );

    for credit in &credits {
        let mut position = load_position(tx, &event.account, &event.market, credit.outcome).await?;
        position.apply_liquidity_delta(
            credit,
            touch,
            ctx.params,
            market.is_losing(credit.outcome),
        )?;
        tx.put(&position).await?;

        if credit.provenance.is_add() {
            let key = position_key(&event.account, &event.market, credit.outcome);
            if let Some(mut cost_basis) = tx.get::<CostBasis>(&key).await? {
                if cost_basis.merge_liquidity_basis(credit.shares, credit.price, ctx.params)? {
                    tx.put(&cost_basis).await?;
                }
            }
        }
    }

    Ok(())
}

pub async fn handle_claim(
    tx: &mut EntityTx,
    ctx: &HandlerContext<'_>,
    claim: &ClaimEvent,
    touch: &Touch,
) -> Result<(), HandlerError> {
    let mut market = ensure_subjects(tx, &claim.account, &claim.market, touch.timestamp).await?;

    let key = position_key(&claim.account, &claim.market, claim.winning_outcome);
    let cost_basis = tx.get::<CostBasis>(&key).await?;
    let mut position =
        load_position(tx, &claim.account, &claim.market, claim.winning_outcome).await?;
    position.apply_claim(claim, cost_basis.as_ref(), touch, ctx.params)?;
    tx.put(&position).await?;

    // Settlement sweep over every stored sibling of this account and market.
    let siblings = tx
        .positions_for(claim.account.as_str(), claim.market.as_str())
        .await?;
    let mut swept = 0usize;
    for mut sibling in siblings {
        if sibling.outcome == claim.winning_outcome || !sibling.open {
            continue;
        }
        sibling.close_for_settlement(touch);
        tx.put(&sibling).await?;
        swept += 1;
    }

    match market.winning_outcome {
        None => {
            market.winning_outcome = Some(claim.winning_outcome);
            tx.put(&market).await?;
        }
        Some(recorded) if recorded != claim.winning_outcome => {
            warn!(
                market = %claim.market,
                recorded = %recorded,
                claimed = %claim.winning_outcome,
                "Claim names a different winning outcome than recorded"
            );
        }
        Some(_) => {}
    }

    debug!(
        account = %claim.account,
        market = %claim.market,
        outcome = %claim.winning_outcome,
        payout = %claim.payout,
        settlement_fee = %claim.settlement_fee,
        swept,
        "Applied claim"
    );
    Ok(())
}

pub async fn handle_mint(
    tx: &mut EntityTx,
    ctx: &HandlerContext<'_>,
    mint: &MintEvent,
    touch: &Touch,
) -> Result<(), HandlerError> {
    let market = ensure_subjects(tx, &mint.account, &mint.market, touch.timestamp).await?;

    let outcomes = ctx.outcomes_or_empty(&mint.market).await;
    let Some(cost) = mint_cost_per_outcome(mint.amount, outcomes.len(), ctx.params)? else {
        debug!(market = %mint.market, "Mint credited no outcome");
        return Ok(());
    };

    for outcome in outcomes {
        let mut position = load_position(tx, &mint.account, &mint.market, outcome).await?;
        position.apply_mint(
            mint.amount,
            cost,
            touch,
            ctx.params,
            market.is_losing(outcome),
        )?;
        tx.put(&position).await?;
    }

    Ok(())
}
