// 8.3 engine/margin.rs: the multi-market coordinator. folds every market an account
// touches into one AccountMargin. prices come from the oracle and fail closed.

use super::core::Engine;
use super::results::EngineError;
use crate::amm::AmmAdapter;
use crate::funding;
use crate::margin::{AccountMargin, MarketExposure};
use crate::oracle::PriceOracle;
use crate::types::AccountId;
use rust_decimal::Decimal;

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    /// Margin summary over committed state. callers that need it current
    /// refresh the account's markets first.
    pub fn account_margin(&self, account: AccountId) -> Result<AccountMargin, EngineError> {
        let collateral_value = self.ledger.vault.get_reserve_value(account, true)?;
        let mut exposures = Vec::new();

        for (market_id, market) in &self.ledger.markets {
            let trader = market.trader(account);
            let lp = market.lp(account);
            if trader.is_none() && lp.is_none() {
                continue;
            }

            let index_price = self.oracle.index_price(*market_id, self.current_time)?;
            let mut exposure = MarketExposure {
                market: *market_id,
                risk_weight: market.params.risk_weight,
                ..MarketExposure::default()
            };
            if let Some(position) = trader {
                exposure.trader_notional = position.open_notional;
                exposure.unrealized_pnl += position.unrealized_pnl(index_price)?;
                exposure.pending_funding += funding::trader_pending_funding(position, &market.global)?;
            }
            if let Some(position) = lp {
                exposure.lp_notional = position.open_notional;
                exposure.unrealized_pnl += position.unrealized_pnl(
                    market.pool.pool_balances(),
                    market.pool.total_shares(),
                    &market.global.fee_growth,
                    index_price,
                )?;
                exposure.pending_funding += funding::lp_pending_funding(position, &market.global)?;
            }
            exposures.push(exposure);
        }

        Ok(AccountMargin {
            collateral_value,
            exposures,
        })
    }

    pub fn margin_ratio(&self, account: AccountId) -> Result<Decimal, EngineError> {
        Ok(self.account_margin(account)?.margin_ratio()?)
    }

    pub fn is_valid_margin(&self, account: AccountId, ratio: Decimal) -> Result<bool, EngineError> {
        Ok(self.account_margin(account)?.is_valid(ratio)?)
    }

    /// Equity above the requirement to open new positions.
    pub fn free_collateral(&self, account: AccountId) -> Result<Decimal, EngineError> {
        Ok(self
            .account_margin(account)?
            .free_collateral(self.params.min_margin_at_creation)?)
    }
}
