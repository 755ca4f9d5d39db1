//! Dust classification.
//!
//! After a trade the engine may be left with a small base residual that no
//! position can hold: a short closed by buying a hair more base than it owed,
//! an LP unwind that does not net its exposure exactly, or a reduction whose
//! remainder is too small to stand on its own. Residuals up to the market's
//! threshold are moved onto the protocol's dust position and closed in the
//! same transaction. Anything larger reverts the operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DustAction {
    /// Nothing left over.
    None,
    /// Signed base residual small enough for the protocol to settle.
    Settle(Decimal),
    /// Residual too large; the operation must be rolled back.
    Reject { residual: Decimal, threshold: Decimal },
}

pub fn classify(residual: Decimal, threshold: Decimal) -> DustAction {
    if residual.is_zero() {
        DustAction::None
    } else if residual.abs() <= threshold {
        DustAction::Settle(residual)
    } else {
        DustAction::Reject { residual, threshold }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_residual_needs_nothing() {
        assert_eq!(classify(Decimal::ZERO, dec!(0.001)), DustAction::None);
        assert_eq!(classify(Decimal::ZERO, Decimal::ZERO), DustAction::None);
    }

    #[test]
    fn threshold_is_inclusive_both_signs() {
        assert_eq!(classify(dec!(0.001), dec!(0.001)), DustAction::Settle(dec!(0.001)));
        assert_eq!(classify(dec!(-0.001), dec!(0.001)), DustAction::Settle(dec!(-0.001)));
        assert_eq!(classify(dec!(0.0000004), dec!(0.001)), DustAction::Settle(dec!(0.0000004)));
    }

    #[test]
    fn above_threshold_rejects() {
        assert_eq!(
            classify(dec!(-0.0011), dec!(0.001)),
            DustAction::Reject {
                residual: dec!(-0.0011),
                threshold: dec!(0.001)
            }
        );
        assert!(matches!(classify(dec!(1), Decimal::ZERO), DustAction::Reject { .. }));
    }
}
