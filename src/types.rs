// 1.0: all the primitives live here. ids, sides, prices, timestamps.
// every sign flip between long and short goes through Side so it lives in exactly one place.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market-{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account-{}", self.0)
    }
}

// 1.1: pool token slots. quote is always 0, base is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenIndex {
    Quote = 0,
    Base = 1,
}

impl TokenIndex {
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn other(&self) -> Self {
        match self {
            TokenIndex::Quote => TokenIndex::Base,
            TokenIndex::Base => TokenIndex::Quote,
        }
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. sign of `position_size`.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    /// Sign of `open_notional`: a long pays quote to open, a short receives it.
    pub fn notional_sign(&self) -> Decimal {
        -self.sign()
    }

    /// Multiplier applied to `(global - snapshot) * |size|` to get funding received.
    /// longs pay when the cumulative rate rises, shorts receive.
    pub fn funding_sign(&self) -> Decimal {
        -self.sign()
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Token sold and token bought when trading in this direction.
    pub fn swap_direction(&self) -> (TokenIndex, TokenIndex) {
        match self {
            Side::Long => (TokenIndex::Quote, TokenIndex::Base),
            Side::Short => (TokenIndex::Base, TokenIndex::Quote),
        }
    }

    pub fn signed_size(&self, abs_size: Decimal) -> Decimal {
        self.sign() * abs_size.abs()
    }

    pub fn signed_notional(&self, abs_notional: Decimal) -> Decimal {
        self.notional_sign() * abs_notional.abs()
    }

    /// Side of a signed base amount, `None` when flat.
    pub fn of_size(size: Decimal) -> Option<Side> {
        if size > Decimal::ZERO {
            Some(Side::Long)
        } else if size < Decimal::ZERO {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Which kind of position a liquidation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionKind {
    Trader,
    LiquidityProvider,
}

pub const SECONDS_PER_DAY: u64 = 86_400;

// 1.3: second-resolution timestamp. funding and twap math is per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds from `earlier` to self, zero if `earlier` is in the future.
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}s", self.0)
    }
}
