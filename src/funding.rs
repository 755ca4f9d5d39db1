// 5.0: TWAPs and funding. nothing runs on a timer: update_global_state is called lazily
// by the engine before any operation on a market and is a no-op when the market is fresh.
// 5.1 accumulates prices, 5.2 rolls the funding period, 5.3 settles positions.

use crate::config::MarketParams;
use crate::market::GlobalPosition;
use crate::math::{self, MathError};
use crate::position::{LiquidityProviderPosition, TraderPosition};
use crate::types::{Timestamp, SECONDS_PER_DAY};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a call to `update_global_state` changed, for event emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingUpdate {
    /// New `(oracle_twap, market_twap)` when the period rolled.
    pub twap: Option<(Decimal, Decimal)>,
    /// Rate added to `cum_funding_rate` when the period rolled.
    pub funding_rate: Option<Decimal>,
}

impl FundingUpdate {
    pub fn rolled_period(&self) -> bool {
        self.funding_rate.is_some()
    }
}

// 5.1 + 5.2
pub fn update_global_state(
    global: &mut GlobalPosition,
    params: &MarketParams,
    now: Timestamp,
    index_price: Decimal,
    market_price: Decimal,
    total_liquidity: Decimal,
) -> Result<FundingUpdate, MathError> {
    if global.is_fresh(now) {
        return Ok(FundingUpdate::default());
    }

    let elapsed = Decimal::from(now.secs_since(global.time_of_last_trade));
    let twap = &mut global.twap;
    twap.oracle_cumulative = math::checked_add(twap.oracle_cumulative, math::wad_mul(index_price, elapsed)?)?;
    twap.market_cumulative = math::checked_add(twap.market_cumulative, math::wad_mul(market_price, elapsed)?)?;
    global.time_of_last_trade = now;

    let period_secs = now.secs_since(global.time_of_last_twap_update);
    if period_secs < params.twap_frequency_secs {
        return Ok(FundingUpdate::default());
    }

    let period = Decimal::from(period_secs);
    let twap = &mut global.twap;
    twap.oracle_twap = math::wad_div(twap.oracle_cumulative - twap.oracle_cumulative_at_period_start, period)?;
    twap.market_twap = math::wad_div(twap.market_cumulative - twap.market_cumulative_at_period_start, period)?;
    twap.oracle_cumulative_at_period_start = twap.oracle_cumulative;
    twap.market_cumulative_at_period_start = twap.market_cumulative;
    let (oracle_twap, market_twap) = (twap.oracle_twap, twap.market_twap);

    // premium over the period, scaled to a daily rate
    let premium = math::wad_mul(params.sensitivity, market_twap - oracle_twap)?;
    let rate = math::wad_div(math::wad_mul(premium, period)?, Decimal::from(SECONDS_PER_DAY))?;
    global.cum_funding_rate = math::checked_add(global.cum_funding_rate, rate)?;

    // LPs hold the other side of the net trader imbalance
    if !total_liquidity.is_zero() {
        let net_exposure = global.trader_longs - global.trader_shorts;
        let per_token = math::wad_div(math::wad_mul(rate, net_exposure)?, total_liquidity)?;
        global.cum_funding_per_lp_token = math::checked_add(global.cum_funding_per_lp_token, per_token)?;
    }
    global.time_of_last_twap_update = now;

    Ok(FundingUpdate {
        twap: Some((oracle_twap, market_twap)),
        funding_rate: Some(rate),
    })
}

// 5.3: positive = received. longs pay when the cumulative rate rose since their snapshot
pub fn trader_pending_funding(position: &TraderPosition, global: &GlobalPosition) -> Result<Decimal, MathError> {
    let Some(side) = position.side() else {
        return Ok(Decimal::ZERO);
    };
    let delta = global.cum_funding_rate - position.cum_funding_rate;
    math::wad_mul(side.funding_sign() * delta, position.position_size.abs())
}

pub fn settle_trader_funding(position: &mut TraderPosition, global: &GlobalPosition) -> Result<Decimal, MathError> {
    let funding = trader_pending_funding(position, global)?;
    position.cum_funding_rate = global.cum_funding_rate;
    Ok(funding)
}

pub fn lp_pending_funding(position: &LiquidityProviderPosition, global: &GlobalPosition) -> Result<Decimal, MathError> {
    math::wad_mul(
        global.cum_funding_per_lp_token - position.cum_funding_per_lp_token,
        position.liquidity_balance,
    )
}

pub fn settle_lp_funding(
    position: &mut LiquidityProviderPosition,
    global: &GlobalPosition,
) -> Result<Decimal, MathError> {
    let funding = lp_pending_funding(position, global)?;
    position.cum_funding_per_lp_token = global.cum_funding_per_lp_token;
    Ok(funding)
}

/// Moves the long/short aggregates by a signed base change on one position.
pub fn apply_size_change(global: &mut GlobalPosition, size_before: Decimal, size_after: Decimal) {
    let long_part = |size: Decimal| size.max(Decimal::ZERO);
    let short_part = |size: Decimal| (-size).max(Decimal::ZERO);
    global.trader_longs += long_part(size_after) - long_part(size_before);
    global.trader_shorts += short_part(size_after) - short_part(size_before);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> MarketParams {
        MarketParams {
            twap_frequency_secs: 100,
            ..MarketParams::default()
        }
    }

    fn global() -> GlobalPosition {
        GlobalPosition::new(Timestamp::from_secs(1000), dec!(1), dec!(1))
    }

    #[test]
    fn same_timestamp_is_a_no_op() {
        let mut g = global();
        let p = params();
        let now = Timestamp::from_secs(1050);
        update_global_state(&mut g, &p, now, dec!(1), dec!(1.1), dec!(100)).unwrap();
        let once = g.clone();
        let update = update_global_state(&mut g, &p, now, dec!(5), dec!(5), dec!(100)).unwrap();
        assert_eq!(update, FundingUpdate::default());
        assert_eq!(g, once);
    }

    #[test]
    fn accumulates_without_rolling_inside_period() {
        let mut g = global();
        let update =
            update_global_state(&mut g, &params(), Timestamp::from_secs(1050), dec!(2), dec!(3), dec!(1)).unwrap();
        assert!(!update.rolled_period());
        assert_eq!(g.twap.oracle_cumulative, dec!(100));
        assert_eq!(g.twap.market_cumulative, dec!(150));
        assert_eq!(g.cum_funding_rate, Decimal::ZERO);
    }

    #[test]
    fn premium_over_a_day_becomes_the_rate() {
        let mut g = global();
        g.trader_longs = dec!(300);
        g.trader_shorts = dec!(100);
        let p = MarketParams {
            twap_frequency_secs: 86_400,
            ..MarketParams::default()
        };
        let now = Timestamp::from_secs(1000 + 86_400);
        let update = update_global_state(&mut g, &p, now, dec!(1), dec!(1.01), dec!(1000)).unwrap();

        assert_eq!(update.twap, Some((dec!(1), dec!(1.01))));
        assert_eq!(update.funding_rate, Some(dec!(0.01)));
        assert_eq!(g.cum_funding_rate, dec!(0.01));
        // 0.01 * (300 - 100) / 1000
        assert_eq!(g.cum_funding_per_lp_token, dec!(0.002));
        assert_eq!(g.time_of_last_twap_update, now);
    }

    #[test]
    fn funding_is_zero_sum_between_longs_shorts_and_lps() {
        let mut g = global();
        let mut long = TraderPosition {
            open_notional: dec!(-300),
            position_size: dec!(300),
            cum_funding_rate: Decimal::ZERO,
        };
        let mut short = TraderPosition {
            open_notional: dec!(100),
            position_size: dec!(-100),
            cum_funding_rate: Decimal::ZERO,
        };
        let mut lp = LiquidityProviderPosition {
            liquidity_balance: dec!(1000),
            ..LiquidityProviderPosition::default()
        };
        g.trader_longs = dec!(300);
        g.trader_shorts = dec!(100);
        let p = MarketParams {
            twap_frequency_secs: 86_400,
            ..MarketParams::default()
        };
        update_global_state(&mut g, &p, Timestamp::from_secs(1000 + 86_400), dec!(1), dec!(1.01), dec!(1000))
            .unwrap();

        let paid_by_long = settle_trader_funding(&mut long, &g).unwrap();
        let got_by_short = settle_trader_funding(&mut short, &g).unwrap();
        let got_by_lp = settle_lp_funding(&mut lp, &g).unwrap();
        assert_eq!(paid_by_long, dec!(-3));
        assert_eq!(got_by_short, dec!(1));
        assert_eq!(got_by_lp, dec!(2));
        assert_eq!(paid_by_long + got_by_short + got_by_lp, Decimal::ZERO);

        // snapshots moved, nothing left to settle
        assert_eq!(trader_pending_funding(&long, &g).unwrap(), Decimal::ZERO);
        assert_eq!(lp_pending_funding(&lp, &g).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn size_changes_move_aggregates() {
        let mut g = GlobalPosition::default();
        apply_size_change(&mut g, Decimal::ZERO, dec!(5));
        apply_size_change(&mut g, Decimal::ZERO, dec!(-2));
        assert_eq!((g.trader_longs, g.trader_shorts), (dec!(5), dec!(2)));
        apply_size_change(&mut g, dec!(5), dec!(1));
        apply_size_change(&mut g, dec!(-2), Decimal::ZERO);
        assert_eq!((g.trader_longs, g.trader_shorts), (dec!(1), Decimal::ZERO));
    }
}
