//! Deterministic 18-decimal fixed-point helpers.
//!
//! Every product and quotient in the accounting core goes through these so
//! results truncate the same way regardless of operand scale. Overflow is an
//! error the caller propagates, never a panic.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept after every multiply or divide.
pub const WAD_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("fixed-point overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,
}

/// Truncate toward zero at 18 decimals.
pub fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(WAD_DECIMALS, RoundingStrategy::ToZero)
}

pub fn wad_mul(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_mul(b).map(truncate).ok_or(MathError::Overflow)
}

pub fn wad_div(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    a.checked_div(b).map(truncate).ok_or(MathError::Overflow)
}

pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: Decimal, b: Decimal) -> Result<Decimal, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

pub fn abs(value: Decimal) -> Decimal {
    value.abs()
}

/// -1, 0 or 1.
pub fn sign(value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ZERO
    } else if value.is_sign_negative() {
        -Decimal::ONE
    } else {
        Decimal::ONE
    }
}
