//! Engine plumbing, separate from the economic params in `crate::config`.

use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Events kept in memory. older ones are dropped once a transaction commits.
    pub max_events: usize,
    /// Symbol of the settlement collateral at vault index 0.
    pub ua_symbol: String,
    /// Insurance reserve balance at startup.
    pub initial_insurance: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            ua_symbol: "UA".to_string(),
            initial_insurance: Decimal::ZERO,
        }
    }
}
