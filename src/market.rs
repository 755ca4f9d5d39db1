//! Per-market state.
//!
//! A market owns its virtual-token pool, the aggregate `GlobalPosition`
//! (funding and fee accumulators, trader and LP totals) and every trader and
//! LP position opened on it. The engine is the only writer.

use crate::amm::AmmAdapter;
use crate::config::MarketParams;
use crate::position::{FeeGrowth, LiquidityProviderPosition, TraderPosition};
use crate::types::{AccountId, MarketId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price accumulators for the oracle and market TWAPs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapState {
    /// Running sum of `index_price * seconds`.
    pub oracle_cumulative: Decimal,
    /// Running sum of `market_price * seconds`.
    pub market_cumulative: Decimal,
    pub oracle_cumulative_at_period_start: Decimal,
    pub market_cumulative_at_period_start: Decimal,
    pub oracle_twap: Decimal,
    pub market_twap: Decimal,
}

/// Market-wide aggregate shared by every account on the market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub time_of_last_trade: Timestamp,
    pub time_of_last_twap_update: Timestamp,
    pub twap: TwapState,
    /// Funding per unit of base, cumulative. rises when longs owe shorts.
    pub cum_funding_rate: Decimal,
    /// Funding per LP share, cumulative. positive means LPs received.
    pub cum_funding_per_lp_token: Decimal,
    pub fee_growth: FeeGrowth,
    /// Aggregate long base held by traders.
    pub trader_longs: Decimal,
    /// Aggregate short base held by traders, unsigned.
    pub trader_shorts: Decimal,
    pub total_quote_provided: Decimal,
    pub total_base_provided: Decimal,
}

impl GlobalPosition {
    pub fn new(now: Timestamp, index_price: Decimal, market_price: Decimal) -> Self {
        Self {
            time_of_last_trade: now,
            time_of_last_twap_update: now,
            twap: TwapState {
                oracle_twap: index_price,
                market_twap: market_price,
                ..TwapState::default()
            },
            ..Self::default()
        }
    }

    /// Nothing to accrue at `now`.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        now <= self.time_of_last_trade
    }
}

/// Quote notional swapped on a market within one timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTradeWindow {
    pub timestamp: Timestamp,
    pub traded: Decimal,
}

impl BlockTradeWindow {
    pub fn traded_at(&self, now: Timestamp) -> Decimal {
        if self.timestamp == now {
            self.traded
        } else {
            Decimal::ZERO
        }
    }

    pub fn record(&mut self, now: Timestamp, amount: Decimal) {
        if self.timestamp != now {
            self.timestamp = now;
            self.traded = Decimal::ZERO;
        }
        self.traded += amount;
    }
}

#[derive(Debug, Clone)]
pub struct MarketState<A> {
    pub id: MarketId,
    pub name: String,
    pub params: MarketParams,
    pub pool: A,
    pub global: GlobalPosition,
    pub traders: BTreeMap<AccountId, TraderPosition>,
    pub lps: BTreeMap<AccountId, LiquidityProviderPosition>,
    /// The protocol's own counter-position for residual base.
    pub dust: TraderPosition,
    pub block_trades: BlockTradeWindow,
}

impl<A: AmmAdapter> MarketState<A> {
    pub fn new(id: MarketId, name: &str, params: MarketParams, pool: A, global: GlobalPosition) -> Self {
        Self {
            id,
            name: name.to_string(),
            params,
            pool,
            global,
            traders: BTreeMap::new(),
            lps: BTreeMap::new(),
            dust: TraderPosition::default(),
            block_trades: BlockTradeWindow::default(),
        }
    }

    pub fn trader(&self, account: AccountId) -> Option<&TraderPosition> {
        self.traders.get(&account)
    }

    pub fn lp(&self, account: AccountId) -> Option<&LiquidityProviderPosition> {
        self.lps.get(&account)
    }

    pub fn has_position(&self, account: AccountId) -> bool {
        self.traders.contains_key(&account) || self.lps.contains_key(&account)
    }

    /// Pool share supply, the denominator of every per-LP index.
    pub fn total_liquidity(&self) -> Decimal {
        self.pool.total_shares()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn block_window_resets_when_time_moves() {
        let mut window = BlockTradeWindow::default();
        let t1 = Timestamp::from_secs(10);
        window.record(t1, dec!(100));
        window.record(t1, dec!(50));
        assert_eq!(window.traded_at(t1), dec!(150));

        let t2 = Timestamp::from_secs(11);
        assert_eq!(window.traded_at(t2), Decimal::ZERO);
        window.record(t2, dec!(5));
        assert_eq!(window.traded_at(t2), dec!(5));
    }

    #[test]
    fn new_global_seeds_twaps() {
        let global = GlobalPosition::new(Timestamp::from_secs(7), dec!(1.1), dec!(1.2));
        assert_eq!(global.twap.oracle_twap, dec!(1.1));
        assert_eq!(global.twap.market_twap, dec!(1.2));
        assert!(global.is_fresh(Timestamp::from_secs(7)));
        assert!(!global.is_fresh(Timestamp::from_secs(8)));
    }
}
