// 7.0 config.rs: every tunable in one place. clearing-house wide params and per-market params.
// 7.1 params are injected already-validated. validate() is the only gate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// Account-wide margin, liquidation and seizure params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearingHouseParams {
    // ratio below which an account can be liquidated
    pub min_margin: Decimal,
    // ratio an account must keep after extending a position or withdrawing
    pub min_margin_at_creation: Decimal,
    // smallest non-zero |open_notional| a position may hold, in UA
    pub min_positive_open_notional: Decimal,
    // share of the liquidated notional charged to the liquidatee
    pub liquidation_reward: Decimal,
    // part of that reward routed to insurance instead of the liquidator
    pub liquidation_reward_insurance_share: Decimal,
    // price multiplier when a liquidator buys a whole collateral balance
    pub liquidation_discount: Decimal,
    // steeper multiplier when only part of a balance is seized
    pub non_ua_coll_seizure_discount: Decimal,
    // UA debt at or above which collateral can always be seized
    pub ua_debt_seizure_threshold: Decimal,
}

impl Default for ClearingHouseParams {
    fn default() -> Self {
        Self {
            min_margin: dec!(0.025),
            min_margin_at_creation: dec!(0.055),
            min_positive_open_notional: dec!(35),
            liquidation_reward: dec!(0.015),
            liquidation_reward_insurance_share: dec!(0.5),
            liquidation_discount: dec!(0.95),
            non_ua_coll_seizure_discount: dec!(0.75),
            ua_debt_seizure_threshold: dec!(10000),
        }
    }
}

impl ClearingHouseParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_margin <= Decimal::ZERO || self.min_margin >= Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "min margin must be between 0 and 1".to_string(),
            });
        }
        if self.min_margin_at_creation <= self.min_margin || self.min_margin_at_creation >= Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "margin at creation must exceed min margin and stay below 1".to_string(),
            });
        }
        if self.liquidation_reward <= Decimal::ZERO || self.liquidation_reward >= self.min_margin {
            return Err(ConfigError::InvalidLiquidation {
                reason: "liquidation reward must be positive and below min margin".to_string(),
            });
        }
        if self.liquidation_reward_insurance_share < Decimal::ZERO
            || self.liquidation_reward_insurance_share > Decimal::ONE
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "insurance share must be within [0, 1]".to_string(),
            });
        }
        if self.non_ua_coll_seizure_discount <= Decimal::ZERO
            || self.non_ua_coll_seizure_discount > self.liquidation_discount
            || self.liquidation_discount > Decimal::ONE
        {
            return Err(ConfigError::InvalidLiquidation {
                reason: "seizure discounts must satisfy 0 < partial <= full <= 1".to_string(),
            });
        }
        if self.min_positive_open_notional < Decimal::ZERO || self.ua_debt_seizure_threshold < Decimal::ZERO {
            return Err(ConfigError::InvalidLiquidation {
                reason: "thresholds cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

/** 7.2: per-market params. risk weight scales the market's share of margin requirements */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    pub risk_weight: Decimal,
    pub twap_frequency_secs: u64,
    // scales the twap premium into the funding rate
    pub sensitivity: Decimal,
    // cap on the quote liquidity LPs may supply, in UA
    pub max_liquidity_provided: Decimal,
    // cap on |position_size| in base units
    pub max_position: Decimal,
    // cap on quote notional swapped per timestamp
    pub max_block_trade_amount: Decimal,
    // charged on added open notional
    pub insurance_fee: Decimal,
    pub lock_period_secs: u64,
    // allowed distance of a deposit's quote/base ratio from the pool price
    pub lp_deviation_tolerance: Decimal,
    // largest base residual the protocol absorbs and settles on its own
    pub dust_threshold: Decimal,
}

impl Default for MarketParams {
    fn default() -> Self {
        MarketClass::Forex.params()
    }
}

impl MarketParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk_weight < Decimal::ONE {
            return Err(ConfigError::InvalidMarket {
                reason: "risk weight must be at least 1".to_string(),
            });
        }
        if self.twap_frequency_secs == 0 {
            return Err(ConfigError::InvalidFunding {
                reason: "twap frequency must be positive".to_string(),
            });
        }
        if self.sensitivity < Decimal::ZERO {
            return Err(ConfigError::InvalidFunding {
                reason: "sensitivity cannot be negative".to_string(),
            });
        }
        if self.insurance_fee < Decimal::ZERO || self.insurance_fee > dec!(0.01) {
            return Err(ConfigError::InvalidFees {
                reason: "insurance fee must be within [0, 1%]".to_string(),
            });
        }
        if self.max_liquidity_provided <= Decimal::ZERO
            || self.max_position <= Decimal::ZERO
            || self.max_block_trade_amount <= Decimal::ZERO
        {
            return Err(ConfigError::InvalidMarket {
                reason: "liquidity, position and block trade caps must be positive".to_string(),
            });
        }
        if self.lp_deviation_tolerance <= Decimal::ZERO || self.lp_deviation_tolerance >= Decimal::ONE {
            return Err(ConfigError::InvalidMarket {
                reason: "lp deviation tolerance must be between 0 and 1".to_string(),
            });
        }
        if self.dust_threshold < Decimal::ZERO {
            return Err(ConfigError::InvalidMarket {
                reason: "dust threshold cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid margin params: {reason}")]
    InvalidMargin { reason: String },

    #[error("invalid liquidation params: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("invalid market params: {reason}")]
    InvalidMarket { reason: String },

    #[error("invalid funding params: {reason}")]
    InvalidFunding { reason: String },

    #[error("invalid fee params: {reason}")]
    InvalidFees { reason: String },
}

// Market presets. crypto pairs move more, so they weigh heavier in margin
// and get a tighter per-block trade cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketClass {
    Forex,
    Crypto,
}

impl MarketClass {
    pub fn params(&self) -> MarketParams {
        match self {
            MarketClass::Forex => MarketParams {
                risk_weight: dec!(1),
                twap_frequency_secs: 900,
                sensitivity: dec!(1),
                max_liquidity_provided: dec!(1_000_000),
                max_position: dec!(1_000_000),
                max_block_trade_amount: dec!(100_000),
                insurance_fee: dec!(0.001),
                lock_period_secs: 86_400,
                lp_deviation_tolerance: dec!(0.1),
                dust_threshold: dec!(0.001),
            },
            MarketClass::Crypto => MarketParams {
                risk_weight: dec!(1.5),
                max_block_trade_amount: dec!(50_000),
                ..MarketClass::Forex.params()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_valid() {
        assert!(ClearingHouseParams::default().validate().is_ok());
        assert!(MarketParams::default().validate().is_ok());
        assert!(MarketClass::Crypto.params().validate().is_ok());
    }

    #[test]
    fn crypto_weighs_heavier_than_forex() {
        assert!(MarketClass::Crypto.params().risk_weight > MarketClass::Forex.params().risk_weight);
    }

    #[test]
    fn margin_at_creation_must_exceed_min_margin() {
        let params = ClearingHouseParams {
            min_margin_at_creation: dec!(0.02),
            ..ClearingHouseParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::InvalidMargin { .. })));
    }

    #[test]
    fn reward_must_fit_inside_min_margin() {
        let params = ClearingHouseParams {
            liquidation_reward: dec!(0.03),
            ..ClearingHouseParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::InvalidLiquidation { .. })));
    }

    #[test]
    fn zero_twap_frequency_rejected() {
        let params = MarketParams {
            twap_frequency_secs: 0,
            ..MarketParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::InvalidFunding { .. })));
    }

    #[test]
    fn params_serialize() {
        let params = MarketClass::Crypto.params();
        let json = serde_json::to_string(&params).unwrap();
        let back: MarketParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
