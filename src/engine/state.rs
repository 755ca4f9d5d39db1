//! Lazy market refresh.
//!
//! Funding and TWAPs only advance when an operation touches a market. Every
//! public operation refreshes the markets it reads before doing anything else.
//! A market already refreshed at the current timestamp is skipped without
//! querying the oracle.

use super::core::Engine;
use super::results::EngineError;
use crate::amm::AmmAdapter;
use crate::events::{EventPayload, FundingRateUpdatedEvent, TwapUpdatedEvent};
use crate::funding::{self, FundingUpdate};
use crate::oracle::PriceOracle;
use crate::types::{AccountId, MarketId};
use tracing::debug;

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    /// Brings one market's TWAPs and funding accumulators up to the current time.
    pub fn update_global_state(&mut self, market_id: MarketId) -> Result<FundingUpdate, EngineError> {
        self.atomically(|engine| engine.ensure_fresh(market_id))
    }

    pub(super) fn ensure_fresh(&mut self, market_id: MarketId) -> Result<FundingUpdate, EngineError> {
        let now = self.current_time;
        if self.market(market_id)?.global.is_fresh(now) {
            return Ok(FundingUpdate::default());
        }

        let index_price = self.oracle.index_price(market_id, now)?;
        let market = self.market_mut(market_id)?;
        let market_price = market.pool.spot_price().unwrap_or(index_price);
        let total_liquidity = market.total_liquidity();
        let update = funding::update_global_state(
            &mut market.global,
            &market.params,
            now,
            index_price,
            market_price,
            total_liquidity,
        )?;

        if let (Some((oracle_twap, market_twap)), Some(funding_rate)) = (update.twap, update.funding_rate) {
            let cum_funding_rate = market.global.cum_funding_rate;
            let cum_funding_per_lp_token = market.global.cum_funding_per_lp_token;
            debug!(market = %market_id, %oracle_twap, %market_twap, %funding_rate, "funding period rolled");
            self.emit_event(EventPayload::TwapUpdated(TwapUpdatedEvent {
                market: market_id,
                oracle_twap,
                market_twap,
            }));
            self.emit_event(EventPayload::FundingRateUpdated(FundingRateUpdatedEvent {
                market: market_id,
                funding_rate,
                cum_funding_rate,
                cum_funding_per_lp_token,
            }));
        }
        Ok(update)
    }

    /// Refreshes every market `account` holds a position in.
    pub(super) fn refresh_markets_of(&mut self, account: AccountId) -> Result<(), EngineError> {
        let ids: Vec<MarketId> = self
            .ledger
            .markets
            .values()
            .filter(|market| market.has_position(account))
            .map(|market| market.id)
            .collect();
        for market_id in ids {
            self.ensure_fresh(market_id)?;
        }
        Ok(())
    }

    /// Refreshes `market_id` plus the markets `account` is exposed to, ahead of a margin check.
    pub(super) fn refresh_for(&mut self, account: AccountId, market_id: MarketId) -> Result<(), EngineError> {
        self.ensure_fresh(market_id)?;
        self.refresh_markets_of(account)
    }

    pub(super) fn has_any_position(&self, account: AccountId) -> bool {
        self.ledger.markets.values().any(|market| market.has_position(account))
    }
}
