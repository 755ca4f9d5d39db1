// perps-vamm: perpetual futures clearing house on a virtual-token AMM.
// margin-first architecture: every state change is checked against account-wide margin.
// no external I/O: prices come from an injected oracle, time from the engine clock.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, AccountId, Side, TokenIndex, Timestamp
//   1.5  math.rs: 18-decimal truncating fixed point
//   2.x  amm.rs: pool adapter trait, constant product pool, exact-out solver
//   3.x  margin.rs: account-wide margin ratio and thresholds
//   4.x  position.rs: trader and LP positions, LP fee checkpoint
//   5.x  funding.rs: TWAPs, funding rate, per-position settlement
//   6.x  dust.rs: residual base classification
//   7.x  config.rs: clearing house and market params, market presets
//   8.x  engine/: trading, liquidity, liquidation, seizure, views
//   9.x  oracle.rs: index price feeds with staleness and sequencer checks
//   10.x vault.rs: multi-collateral balances
//   10.5 insurance.rs: insurance reserve and system bad debt
//   11.x events.rs: state transition events for audit
//   12.x market.rs: per-market runtime state

// accounting core
pub mod engine;
pub mod events;
pub mod funding;
pub mod margin;
pub mod market;
pub mod math;
pub mod position;
pub mod types;

// risk modules
pub mod dust;
pub mod insurance;

// collaborators
pub mod amm;
pub mod config;
pub mod oracle;
pub mod vault;

// re exports for convenience
pub use amm::{AmmAdapter, AmmError, ConstantProductPool, SwapQuote};
pub use config::{ClearingHouseParams, ConfigError, MarketClass, MarketParams};
pub use dust::DustAction;
pub use engine::*;
pub use events::*;
pub use funding::FundingUpdate;
pub use insurance::{InsuranceError, InsuranceReserve};
pub use margin::{AccountMargin, MarketExposure};
pub use market::{GlobalPosition, MarketState};
pub use math::MathError;
pub use oracle::{FeedOracle, OracleError, PriceOracle};
pub use position::{FeeGrowth, LiquidityProviderPosition, TraderPosition};
pub use types::*;
pub use vault::{CollateralIdx, Vault, VaultError, UA};
