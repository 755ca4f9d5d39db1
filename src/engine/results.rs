// 8.0.2: result types and errors for engine operations.

use crate::amm::AmmError;
use crate::config::ConfigError;
use crate::insurance::InsuranceError;
use crate::math::MathError;
use crate::oracle::OracleError;
use crate::types::{AccountId, MarketId, PositionKind, Side, Timestamp};
use crate::vault::{CollateralIdx, VaultError};
use rust_decimal::Decimal;

/// Outcome of a trader trade. `profit` is realized PnL plus settled funding
/// minus the trading fee. the vault moved by `profit - insurance_fee`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePositionResult {
    pub side: Side,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub realized_pnl: Decimal,
    pub funding: Decimal,
    pub trading_fee: Decimal,
    pub insurance_fee: Decimal,
    pub profit: Decimal,
    pub is_position_increased: bool,
    pub is_position_closed: bool,
    /// Signed base handed to the protocol's dust position, zero if none.
    pub dust: Decimal,
}

impl ChangePositionResult {
    pub fn collateral_delta(&self) -> Decimal {
        self.profit - self.insurance_fee
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReversePositionResult {
    pub close: ChangePositionResult,
    pub open: ChangePositionResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvideLiquidityResult {
    pub tokens_minted: Decimal,
    /// Trading fees collected on the existing balance before it grew.
    pub fees_collected: Decimal,
    pub funding: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveLiquidityResult {
    pub quote_out: Decimal,
    pub base_out: Decimal,
    pub reduction_ratio: Decimal,
    /// Credited to the vault: unwound tokens, collected fees and funding, net of the swap fee.
    pub profit: Decimal,
    pub trading_fee: Decimal,
    pub fees_collected: Decimal,
    pub funding: Decimal,
    pub dust: Decimal,
    pub is_position_closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationResult {
    pub market: MarketId,
    pub account: AccountId,
    pub liquidator: AccountId,
    pub kind: PositionKind,
    pub notional_liquidated: Decimal,
    pub profit: Decimal,
    pub reward: Decimal,
    pub liquidator_reward: Decimal,
    pub insurance_reward: Decimal,
    /// Negative reserve cleared from the account after the close, zero if solvent.
    pub bad_debt: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeizedCollateral {
    pub collateral: CollateralIdx,
    pub amount: Decimal,
    pub paid: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeizeCollateralResult {
    pub debt: Decimal,
    pub seized: Vec<SeizedCollateral>,
    pub debt_covered: Decimal,
    pub debt_socialized: Decimal,
}

/// Coarse error taxonomy for callers deciding whether to retry or fix input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    EconomicGuard,
    StateConsistency,
    Oracle,
    Collaborator,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("market {0} not found")]
    MarketNotFound(MarketId),

    #[error("market {0} already listed")]
    MarketAlreadyListed(MarketId),

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("liquidity amounts must be non-negative and not both zero")]
    ProvideLiquidityZeroAmount,

    #[error("proposed amount {proposed} does not match the position to unwind")]
    InvalidProposedAmount { proposed: Decimal },

    #[error("output {actual} below minimum {minimum}")]
    Slippage { minimum: Decimal, actual: Decimal },

    #[error("open notional {open_notional} below minimum {minimum}")]
    UnderOpenNotionalAmountRequired { open_notional: Decimal, minimum: Decimal },

    #[error("margin too low to extend position")]
    ExtendPositionInsufficientMargin,

    #[error("position size {size} exceeds max {max}")]
    MaxPositionSize { size: Decimal, max: Decimal },

    #[error("block trade amount {traded} exceeds max {max}")]
    ExcessiveBlockTradeAmount { traded: Decimal, max: Decimal },

    #[error("trade would reverse the position")]
    AttemptReversePosition,

    #[error("no position to reverse")]
    NoPositionToReverse,

    #[error("close leg left {remaining_size} open")]
    ReverseCloseIncomplete { remaining_size: Decimal },

    #[error("dust {residual} exceeds threshold {threshold}")]
    ExcessiveDust { residual: Decimal, threshold: Decimal },

    #[error("deposit ratio deviates {deviation} from pool price, tolerance {tolerance}")]
    LpAmountDeviation { deviation: Decimal, tolerance: Decimal },

    #[error("liquidity provided exceeds free collateral")]
    AmountProvidedTooLarge,

    #[error("market liquidity {provided} would exceed max {max}")]
    MaxLiquidityProvided { provided: Decimal, max: Decimal },

    #[error("withdrawing {requested} lp tokens exceeds balance {balance}")]
    LPWithdrawExceedsBalance { requested: Decimal, balance: Decimal },

    #[error("liquidity locked until {unlock_time}")]
    LockPeriodNotReached { unlock_time: Timestamp },

    #[error("withdrawal would leave margin too low")]
    WithdrawInsufficientMargin,

    #[error("account margin is still valid")]
    LiquidateValidMargin,

    #[error("proposed amount does not fully close the position")]
    LiquidateInsufficientProposedAmount,

    #[error("proposed amount overshoots the position by {overshoot}, dust threshold {threshold}")]
    LiquidateExcessiveProposedAmount { overshoot: Decimal, threshold: Decimal },

    #[error("no position of the requested kind")]
    LiquidateInvalidPosition,

    #[error("account still has open positions")]
    SeizeCollateralStillOpen,

    #[error("collateral covers the debt")]
    SufficientUserCollateral,

    #[error("account has no UA debt")]
    LiquidationDebtSizeZero,

    #[error("liquidator holds {available} UA, needs {required}")]
    LiquidatorInsufficientBalance { required: Decimal, available: Decimal },

    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("amm: {0}")]
    Amm(AmmError),

    #[error("vault: {0}")]
    Vault(#[from] VaultError),

    #[error("insurance: {0}")]
    Insurance(#[from] InsuranceError),

    #[error("math: {0}")]
    Math(#[from] MathError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

// pool slippage is the caller's guard, not a pool failure
impl From<AmmError> for EngineError {
    fn from(err: AmmError) -> Self {
        match err {
            AmmError::Slippage { minimum, actual } => EngineError::Slippage { minimum, actual },
            AmmError::Math(math) => EngineError::Math(math),
            other => EngineError::Amm(other),
        }
    }
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        use EngineError::*;
        match self {
            MarketNotFound(_)
            | MarketAlreadyListed(_)
            | ZeroAmount
            | ProvideLiquidityZeroAmount
            | InvalidProposedAmount { .. }
            | Config(_)
            | Vault(VaultError::UnsupportedCollateral(_) | VaultError::ZeroAmount) => ErrorCategory::Validation,

            Slippage { .. }
            | UnderOpenNotionalAmountRequired { .. }
            | ExtendPositionInsufficientMargin
            | MaxPositionSize { .. }
            | ExcessiveBlockTradeAmount { .. }
            | ExcessiveDust { .. }
            | LpAmountDeviation { .. }
            | AmountProvidedTooLarge
            | MaxLiquidityProvided { .. }
            | LockPeriodNotReached { .. }
            | WithdrawInsufficientMargin
            | LiquidateInsufficientProposedAmount
            | LiquidateExcessiveProposedAmount { .. }
            | SufficientUserCollateral
            | LiquidatorInsufficientBalance { .. } => ErrorCategory::EconomicGuard,

            AttemptReversePosition
            | NoPositionToReverse
            | ReverseCloseIncomplete { .. }
            | LPWithdrawExceedsBalance { .. }
            | LiquidateValidMargin
            | LiquidateInvalidPosition
            | SeizeCollateralStillOpen
            | LiquidationDebtSizeZero => ErrorCategory::StateConsistency,

            Oracle(_) => ErrorCategory::Oracle,

            Amm(_) | Vault(_) | Insurance(_) | Math(_) => ErrorCategory::Collaborator,
        }
    }
}
