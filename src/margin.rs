//! Account-wide margin.
//!
//! Margin is cross-market: one ratio per account, built from the discounted
//! collateral in the vault plus the unrealized PnL and pending funding of every
//! position the account holds, over the sum of `|open_notional|` weighted by
//! each market's risk weight.
//!
//! Threshold checks compare `equity >= weighted_notional * ratio` instead of
//! dividing, so an account sitting exactly on a threshold passes.

use crate::math::{self, MathError};
use crate::types::MarketId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One market's contribution to an account's margin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketExposure {
    pub market: MarketId,
    pub risk_weight: Decimal,
    pub trader_notional: Decimal,
    pub lp_notional: Decimal,
    pub unrealized_pnl: Decimal,
    pub pending_funding: Decimal,
}

impl MarketExposure {
    pub fn weighted_notional(&self) -> Result<Decimal, MathError> {
        math::wad_mul(
            self.trader_notional.abs() + self.lp_notional.abs(),
            self.risk_weight,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMargin {
    /// Weight-discounted collateral value, UA included (may be negative).
    pub collateral_value: Decimal,
    pub exposures: Vec<MarketExposure>,
}

impl AccountMargin {
    pub fn unrealized_pnl(&self) -> Decimal {
        self.exposures.iter().map(|e| e.unrealized_pnl).sum()
    }

    pub fn pending_funding(&self) -> Decimal {
        self.exposures.iter().map(|e| e.pending_funding).sum()
    }

    pub fn equity(&self) -> Result<Decimal, MathError> {
        let pnl = math::checked_add(self.unrealized_pnl(), self.pending_funding())?;
        math::checked_add(self.collateral_value, pnl)
    }

    pub fn weighted_notional(&self) -> Result<Decimal, MathError> {
        let mut total = Decimal::ZERO;
        for exposure in &self.exposures {
            total = math::checked_add(total, exposure.weighted_notional()?)?;
        }
        Ok(total)
    }

    /// `Decimal::MAX` when nothing is open.
    pub fn margin_ratio(&self) -> Result<Decimal, MathError> {
        let weighted = self.weighted_notional()?;
        if weighted.is_zero() {
            return Ok(Decimal::MAX);
        }
        math::wad_div(self.equity()?, weighted)
    }

    /// `margin_ratio() >= ratio`, evaluated without the division. with nothing
    /// open this reduces to `equity >= 0`.
    pub fn is_valid(&self, ratio: Decimal) -> Result<bool, MathError> {
        let required = math::wad_mul(self.weighted_notional()?, ratio)?;
        Ok(self.equity()? >= required)
    }

    /// Equity above what `ratio` requires. negative when under.
    pub fn free_collateral(&self, ratio: Decimal) -> Result<Decimal, MathError> {
        let required = math::wad_mul(self.weighted_notional()?, ratio)?;
        math::checked_sub(self.equity()?, required)
    }

    pub fn has_exposure(&self) -> bool {
        !self.exposures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exposure(market: u32, weight: Decimal, notional: Decimal, pnl: Decimal) -> MarketExposure {
        MarketExposure {
            market: MarketId(market),
            risk_weight: weight,
            trader_notional: notional,
            unrealized_pnl: pnl,
            ..MarketExposure::default()
        }
    }

    #[test]
    fn ratio_sums_across_markets_with_weights() {
        let margin = AccountMargin {
            collateral_value: dec!(100),
            exposures: vec![
                exposure(0, dec!(1), dec!(-1000), dec!(-20)),
                exposure(1, dec!(1.5), dec!(400), dec!(10)),
            ],
        };
        // (100 - 20 + 10) / (1000 + 600)
        assert_eq!(margin.equity().unwrap(), dec!(90));
        assert_eq!(margin.weighted_notional().unwrap(), dec!(1600));
        assert_eq!(margin.margin_ratio().unwrap(), dec!(0.05625));
    }

    #[test]
    fn exact_boundary_is_valid_one_unit_below_is_not() {
        let at = AccountMargin {
            collateral_value: dec!(55),
            exposures: vec![exposure(0, dec!(1), dec!(-1000), Decimal::ZERO)],
        };
        assert!(at.is_valid(dec!(0.055)).unwrap());
        assert_eq!(at.free_collateral(dec!(0.055)).unwrap(), Decimal::ZERO);

        let below = AccountMargin {
            collateral_value: dec!(54.999999999999999999),
            ..at
        };
        assert!(!below.is_valid(dec!(0.055)).unwrap());
    }

    #[test]
    fn no_exposure_is_max_ratio() {
        let margin = AccountMargin {
            collateral_value: dec!(-5),
            exposures: vec![],
        };
        assert_eq!(margin.margin_ratio().unwrap(), Decimal::MAX);
        // nothing to margin, but a negative balance still fails
        assert!(!margin.is_valid(dec!(0.055)).unwrap());
        assert!(!margin.has_exposure());
    }

    #[test]
    fn lp_notional_counts_toward_requirement() {
        let margin = AccountMargin {
            collateral_value: dec!(100),
            exposures: vec![MarketExposure {
                market: MarketId(0),
                risk_weight: dec!(1),
                lp_notional: dec!(-2000),
                pending_funding: dec!(4),
                ..MarketExposure::default()
            }],
        };
        assert_eq!(margin.weighted_notional().unwrap(), dec!(2000));
        assert_eq!(margin.margin_ratio().unwrap(), dec!(0.052));
    }
}
