// 4.0: trader and LP positions. open_notional is quote paid (negative) or received (positive),
// position_size is signed base. a closed position is removed, never left as zeros in a map.
// 4.1 has extend/reduce for traders, 4.2 the LP fee checkpoint.

use crate::math::{self, MathError};
use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderPosition {
    pub open_notional: Decimal,
    pub position_size: Decimal,
    pub cum_funding_rate: Decimal,
}

impl TraderPosition {
    pub fn is_empty(&self) -> bool {
        self.position_size.is_zero() && self.open_notional.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        Side::of_size(self.position_size)
    }

    // 4.1: paper pnl at the index price. size * index + notional
    pub fn unrealized_pnl(&self, index_price: Decimal) -> Result<Decimal, MathError> {
        math::checked_add(math::wad_mul(self.position_size, index_price)?, self.open_notional)
    }

    pub fn extend(&mut self, side: Side, quote_leg: Decimal, base_leg: Decimal) -> Result<(), MathError> {
        self.open_notional = math::checked_add(self.open_notional, side.signed_notional(quote_leg))?;
        self.position_size = math::checked_add(self.position_size, side.signed_size(base_leg))?;
        Ok(())
    }

    /// Removes `base_reduced` (unsigned) from the position and returns the
    /// signed share of `open_notional` that went with it. reducing by the full
    /// size zeroes everything.
    pub fn reduce(&mut self, base_reduced: Decimal) -> Result<Decimal, MathError> {
        let abs_size = self.position_size.abs();
        if base_reduced >= abs_size {
            let closed = self.open_notional;
            *self = TraderPosition::default();
            return Ok(closed);
        }
        let ratio = math::wad_div(base_reduced, abs_size)?;
        let closed = math::wad_mul(self.open_notional, ratio)?;
        let sign = math::sign(self.position_size);
        self.open_notional -= closed;
        self.position_size -= sign * base_reduced;
        Ok(closed)
    }
}

/// Fee indices, global or as an LP snapshot. all three only grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeGrowth {
    pub total_trading_fees_growth: Decimal,
    pub total_quote_fees_growth: Decimal,
    pub total_base_fees_growth: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityProviderPosition {
    pub liquidity_balance: Decimal,
    pub open_notional: Decimal,
    pub position_size: Decimal,
    pub cum_funding_per_lp_token: Decimal,
    pub fee_growth: FeeGrowth,
    // supplied tokens still attributed to this LP, for the market-wide totals
    pub quote_provided: Decimal,
    pub base_provided: Decimal,
    // first deposit, the lock period runs from here
    pub deposit_time: crate::types::Timestamp,
}

impl LiquidityProviderPosition {
    pub fn is_empty(&self) -> bool {
        self.liquidity_balance.is_zero()
    }

    /// Trading fees (UA) accrued since the last checkpoint.
    pub fn pending_trading_fees(&self, global: &FeeGrowth) -> Result<Decimal, MathError> {
        math::wad_mul(
            self.liquidity_balance,
            global.total_trading_fees_growth - self.fee_growth.total_trading_fees_growth,
        )
    }

    /// Pool fee tokens `[quote, base]` sitting in this LP's share of the pool
    /// that were already paid to it as trading fees.
    pub fn owed_fee_tokens(&self, global: &FeeGrowth) -> Result<[Decimal; 2], MathError> {
        Ok([
            math::wad_mul(
                self.liquidity_balance,
                global.total_quote_fees_growth - self.fee_growth.total_quote_fees_growth,
            )?,
            math::wad_mul(
                self.liquidity_balance,
                global.total_base_fees_growth - self.fee_growth.total_base_fees_growth,
            )?,
        ])
    }

    // 4.2: collect fees and start a fresh accrual window. the pool fee tokens are
    // debited from the virtual position so withdrawing them later nets to zero.
    pub fn checkpoint_fees(&mut self, global: &FeeGrowth) -> Result<Decimal, MathError> {
        let fees = self.pending_trading_fees(global)?;
        let [owed_quote, owed_base] = self.owed_fee_tokens(global)?;
        self.open_notional = math::checked_sub(self.open_notional, owed_quote)?;
        self.position_size = math::checked_sub(self.position_size, owed_base)?;
        self.fee_growth = *global;
        Ok(fees)
    }

    /// `[quote, base]` exposure: pool share minus owed fee tokens, plus the virtual position.
    pub fn active_exposure(
        &self,
        pool_balances: [Decimal; 2],
        total_shares: Decimal,
        global: &FeeGrowth,
    ) -> Result<[Decimal; 2], MathError> {
        if total_shares.is_zero() {
            return Ok([self.open_notional, self.position_size]);
        }
        let [owed_quote, owed_base] = self.owed_fee_tokens(global)?;
        let share_quote = math::wad_div(math::wad_mul(pool_balances[0], self.liquidity_balance)?, total_shares)?;
        let share_base = math::wad_div(math::wad_mul(pool_balances[1], self.liquidity_balance)?, total_shares)?;
        Ok([
            self.open_notional + share_quote - owed_quote,
            self.position_size + share_base - owed_base,
        ])
    }

    pub fn unrealized_pnl(
        &self,
        pool_balances: [Decimal; 2],
        total_shares: Decimal,
        global: &FeeGrowth,
        index_price: Decimal,
    ) -> Result<Decimal, MathError> {
        let [net_quote, net_base] = self.active_exposure(pool_balances, total_shares, global)?;
        let value = math::checked_add(net_quote, math::wad_mul(net_base, index_price)?)?;
        math::checked_add(value, self.pending_trading_fees(global)?)
    }
}
