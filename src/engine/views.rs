// 8.7 engine/views.rs: read-only queries over committed state. nothing here refreshes
// funding; call update_global_state first when pending funding must be current.

use super::core::Engine;
use super::results::EngineError;
use crate::amm::{self, AmmAdapter};
use crate::funding;
use crate::math;
use crate::oracle::PriceOracle;
use crate::position::{LiquidityProviderPosition, TraderPosition};
use crate::types::{AccountId, MarketId, Side, TokenIndex};
use rust_decimal::Decimal;

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    pub fn trader_position(&self, account: AccountId, market_id: MarketId) -> Option<&TraderPosition> {
        self.ledger.markets.get(&market_id)?.trader(account)
    }

    pub fn lp_position(&self, account: AccountId, market_id: MarketId) -> Option<&LiquidityProviderPosition> {
        self.ledger.markets.get(&market_id)?.lp(account)
    }

    pub fn index_price(&self, market_id: MarketId) -> Result<Decimal, EngineError> {
        self.market(market_id)?;
        Ok(self.oracle.index_price(market_id, self.current_time)?)
    }

    /// Pool price, `None` while the pool is empty.
    pub fn spot_price(&self, market_id: MarketId) -> Result<Option<Decimal>, EngineError> {
        Ok(self.market(market_id)?.pool.spot_price())
    }

    pub fn trader_unrealized_pnl(&self, account: AccountId, market_id: MarketId) -> Result<Decimal, EngineError> {
        let Some(position) = self.trader_position(account, market_id) else {
            return Ok(Decimal::ZERO);
        };
        Ok(position.unrealized_pnl(self.index_price(market_id)?)?)
    }

    pub fn lp_unrealized_pnl(&self, account: AccountId, market_id: MarketId) -> Result<Decimal, EngineError> {
        let market = self.market(market_id)?;
        let Some(position) = market.lp(account) else {
            return Ok(Decimal::ZERO);
        };
        Ok(position.unrealized_pnl(
            market.pool.pool_balances(),
            market.pool.total_shares(),
            &market.global.fee_growth,
            self.index_price(market_id)?,
        )?)
    }

    /// Trader plus LP funding not yet settled on `market_id`. positive = owed to the account.
    pub fn pending_funding(&self, account: AccountId, market_id: MarketId) -> Result<Decimal, EngineError> {
        let market = self.market(market_id)?;
        let mut total = Decimal::ZERO;
        if let Some(position) = market.trader(account) {
            total += funding::trader_pending_funding(position, &market.global)?;
        }
        if let Some(position) = market.lp(account) {
            total += funding::lp_pending_funding(position, &market.global)?;
        }
        Ok(total)
    }

    /// Amount to pass to `change_position` (or `liquidate`) to close the whole
    /// trader position: its size in base for a long, the quote buying it back for a short.
    pub fn trader_close_amount(&self, account: AccountId, market_id: MarketId) -> Result<Decimal, EngineError> {
        let market = self.market(market_id)?;
        let position = market.trader(account).ok_or(EngineError::LiquidateInvalidPosition)?;
        match position.side() {
            Some(Side::Long) => Ok(position.position_size),
            Some(Side::Short) => Ok(amm::amount_in_for_exact_out(
                &market.pool,
                TokenIndex::Quote,
                TokenIndex::Base,
                position.position_size.abs(),
            )?),
            None => Err(EngineError::LiquidateInvalidPosition),
        }
    }

    /// `proposed_amount` that unwinds the exposure released by burning `lp_amount` shares.
    pub fn lp_proposed_amount(
        &self,
        account: AccountId,
        market_id: MarketId,
        lp_amount: Decimal,
    ) -> Result<Decimal, EngineError> {
        let market = self.market(market_id)?;
        let mut lp = market.lp(account).cloned().ok_or(EngineError::LiquidateInvalidPosition)?;
        if lp_amount <= Decimal::ZERO {
            return Err(EngineError::ZeroAmount);
        }
        if lp_amount > lp.liquidity_balance {
            return Err(EngineError::LPWithdrawExceedsBalance {
                requested: lp_amount,
                balance: lp.liquidity_balance,
            });
        }
        lp.checkpoint_fees(&market.global.fee_growth)?;
        let removed_size = if lp_amount == lp.liquidity_balance {
            lp.position_size
        } else {
            math::wad_mul(lp.position_size, math::wad_div(lp_amount, lp.liquidity_balance)?)?
        };

        let mut pool = market.pool.clone();
        let [_, base_out] = pool.remove_liquidity(lp_amount, [Decimal::ZERO; 2])?;
        let net_base = removed_size + base_out;
        if pool.total_shares().is_zero() {
            // nothing left to swap against, the residual can only go to dust
            Ok(Decimal::ZERO)
        } else if net_base > Decimal::ZERO {
            Ok(net_base)
        } else if net_base < Decimal::ZERO {
            Ok(amm::amount_in_for_exact_out(&pool, TokenIndex::Quote, TokenIndex::Base, -net_base)?)
        } else {
            Ok(Decimal::ZERO)
        }
    }
}
