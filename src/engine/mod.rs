// 8.0: clearing house engine. owns every market, the vault and the insurance reserve,
// refreshes funding lazily, and runs each public operation as one transaction.
// the clock starts at wall time; after set_time every operation is deterministic.

mod config;
mod core;
mod liquidations;
mod liquidity;
mod margin;
mod results;
mod state;
mod trading;
mod views;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{
    ChangePositionResult, EngineError, ErrorCategory, LiquidationResult, ProvideLiquidityResult,
    RemoveLiquidityResult, ReversePositionResult, SeizeCollateralResult, SeizedCollateral,
};
