// 8.0 engine/core.rs: main engine. holds every market, the vault and the insurance reserve.
// all mutable protocol state sits in Ledger so one clone is a full rollback point.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::amm::AmmAdapter;
use crate::config::{ClearingHouseParams, MarketParams};
use crate::events::{
    DepositEvent, Event, EventId, EventPayload, InsuranceFundedEvent, MarketListedEvent, SystemDebtChangedEvent,
    WithdrawalEvent,
};
use crate::insurance::{DebtSettlement, InsuranceReserve};
use crate::market::{GlobalPosition, MarketState};
use crate::oracle::PriceOracle;
use crate::types::{AccountId, MarketId, Timestamp};
use crate::vault::{CollateralIdx, Vault};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Everything an operation may mutate.
#[derive(Debug, Clone)]
pub(super) struct Ledger<A> {
    pub(super) markets: BTreeMap<MarketId, MarketState<A>>,
    pub(super) vault: Vault,
    pub(super) insurance: InsuranceReserve,
}

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<A: AmmAdapter, O: PriceOracle> {
    pub(super) config: EngineConfig,
    pub(super) params: ClearingHouseParams,
    pub(super) ledger: Ledger<A>,
    pub(super) oracle: O,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    // nesting depth of atomically(), the event cap is only applied at depth 0
    pub(super) tx_depth: usize,
}

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    pub fn new(config: EngineConfig, params: ClearingHouseParams, oracle: O) -> Result<Self, EngineError> {
        params.validate()?;
        let ledger = Ledger {
            markets: BTreeMap::new(),
            vault: Vault::new(&config.ua_symbol),
            insurance: InsuranceReserve::new(config.initial_insurance),
        };
        Ok(Self {
            config,
            params,
            ledger,
            oracle,
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::now(),
            tx_depth: 0,
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = self.current_time.plus_secs(secs);
    }

    pub fn params(&self) -> &ClearingHouseParams {
        &self.params
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn vault(&self) -> &Vault {
        &self.ledger.vault
    }

    pub fn insurance(&self) -> &InsuranceReserve {
        &self.ledger.insurance
    }

    pub fn market(&self, market_id: MarketId) -> Result<&MarketState<A>, EngineError> {
        self.ledger
            .markets
            .get(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    pub(super) fn market_mut(&mut self, market_id: MarketId) -> Result<&mut MarketState<A>, EngineError> {
        self.ledger
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    pub fn markets(&self) -> impl Iterator<Item = &MarketState<A>> {
        self.ledger.markets.values()
    }

    /// Lists a market against `pool`. the oracle must already serve an index
    /// price for `market_id`; both TWAPs start from the listing-time prices.
    pub fn list_market(
        &mut self,
        market_id: MarketId,
        name: &str,
        params: MarketParams,
        pool: A,
    ) -> Result<MarketId, EngineError> {
        params.validate()?;
        if self.ledger.markets.contains_key(&market_id) {
            return Err(EngineError::MarketAlreadyListed(market_id));
        }
        let now = self.current_time;
        let index_price = self.oracle.index_price(market_id, now)?;
        let market_price = pool.spot_price().unwrap_or(index_price);
        let global = GlobalPosition::new(now, index_price, market_price);
        self.ledger
            .markets
            .insert(market_id, MarketState::new(market_id, name, params, pool, global));

        info!(market = %market_id, name, %index_price, "market listed");
        self.emit_event(EventPayload::MarketListed(MarketListedEvent {
            market: market_id,
            name: name.to_string(),
            index_price,
        }));
        Ok(market_id)
    }

    pub fn add_collateral(
        &mut self,
        symbol: &str,
        weight: Decimal,
        price: Decimal,
        max_amount: Decimal,
    ) -> Result<CollateralIdx, EngineError> {
        let idx = self.ledger.vault.add_collateral(symbol, weight, price, max_amount)?;
        info!(collateral = idx, symbol, %weight, %price, "collateral whitelisted");
        Ok(idx)
    }

    pub fn set_collateral_price(&mut self, idx: CollateralIdx, price: Decimal) -> Result<(), EngineError> {
        self.ledger.vault.set_collateral_price(idx, price)?;
        Ok(())
    }

    pub fn deposit(&mut self, account: AccountId, collateral: CollateralIdx, amount: Decimal) -> Result<(), EngineError> {
        self.atomically(|engine| {
            engine.ledger.vault.deposit(account, collateral, amount)?;
            let new_balance = engine.ledger.vault.get_balance(account, collateral);
            engine.emit_event(EventPayload::Deposit(DepositEvent {
                account,
                collateral,
                amount,
                new_balance,
            }));
            Ok(())
        })
    }

    // the account must still meet the margin needed to open a position afterwards
    pub fn withdraw(&mut self, account: AccountId, collateral: CollateralIdx, amount: Decimal) -> Result<(), EngineError> {
        self.atomically(|engine| {
            engine.refresh_markets_of(account)?;
            engine.ledger.vault.withdraw(account, collateral, amount)?;
            if !engine.is_valid_margin(account, engine.params.min_margin_at_creation)? {
                return Err(EngineError::WithdrawInsufficientMargin);
            }
            let new_balance = engine.ledger.vault.get_balance(account, collateral);
            engine.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
                account,
                collateral,
                amount,
                new_balance,
            }));
            Ok(())
        })
    }

    pub fn fund_insurance(&mut self, amount: Decimal) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::ZeroAmount);
        }
        self.atomically(|engine| {
            let debt_repaid = engine.credit_insurance(amount);
            engine.emit_event(EventPayload::InsuranceFunded(InsuranceFundedEvent { amount, debt_repaid }));
            Ok(())
        })
    }

    pub fn withdraw_insurance_surplus(&mut self, amount: Decimal) -> Result<(), EngineError> {
        self.ledger.insurance.withdraw_surplus(amount)?;
        info!(%amount, remaining = %self.ledger.insurance.balance(), "insurance surplus withdrawn");
        Ok(())
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Runs `op` as one transaction. on error every market, the vault, the
    /// insurance reserve and the event log are restored to their state before the call.
    pub(super) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let snapshot = self.ledger.clone();
        let events_len = self.events.len();
        let next_event_id = self.next_event_id;

        self.tx_depth += 1;
        let result = op(self);
        self.tx_depth -= 1;

        match result {
            Ok(value) => {
                if self.tx_depth == 0 {
                    self.trim_events();
                }
                Ok(value)
            }
            Err(err) => {
                self.ledger = snapshot;
                self.events.truncate(events_len);
                self.next_event_id = next_event_id;
                debug!(error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    /// Routes an inflow to the insurance reserve. returns the part that repaid system debt.
    pub(super) fn credit_insurance(&mut self, amount: Decimal) -> Decimal {
        let outcome = self.ledger.insurance.fund(amount);
        if outcome.debt_repaid > Decimal::ZERO {
            let new_value = self.ledger.insurance.system_bad_debt();
            info!(repaid = %outcome.debt_repaid, %new_value, "system bad debt repaid");
            self.emit_event(EventPayload::SystemDebtChanged(SystemDebtChangedEvent { new_value }));
        }
        outcome.debt_repaid
    }

    pub(super) fn settle_bad_debt(&mut self, debt: Decimal) -> DebtSettlement {
        let settlement = self.ledger.insurance.settle_debt(debt);
        if settlement.shortfall > Decimal::ZERO {
            let new_value = self.ledger.insurance.system_bad_debt();
            warn!(shortfall = %settlement.shortfall, %new_value, "insurance exhausted, system bad debt grew");
            self.emit_event(EventPayload::SystemDebtChanged(SystemDebtChangedEvent { new_value }));
        }
        settlement
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;
        self.events.push(event);

        if self.tx_depth == 0 {
            self.trim_events();
        }
    }

    fn trim_events(&mut self) {
        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::ConstantProductPool;
    use crate::math::MathError;
    use crate::oracle::FeedOracle;
    use crate::vault::UA;
    use rust_decimal_macros::dec;

    type TestEngine = Engine<ConstantProductPool, FeedOracle>;

    const ALICE: AccountId = AccountId(1);
    const EUR_USD: MarketId = MarketId(0);

    fn engine() -> TestEngine {
        let mut oracle = FeedOracle::default();
        oracle.set_fixed_price(EUR_USD, dec!(1.1));
        Engine::new(EngineConfig::default(), ClearingHouseParams::default(), oracle).unwrap()
    }

    #[test]
    fn invalid_params_refused() {
        let params = ClearingHouseParams {
            min_margin: dec!(0),
            ..ClearingHouseParams::default()
        };
        let result = TestEngine::new(EngineConfig::default(), params, FeedOracle::default());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn listing_needs_an_index_price() {
        let mut engine = engine();
        let err = engine
            .list_market(MarketId(9), "GBP/USD", MarketParams::default(), ConstantProductPool::new(dec!(0.003)))
            .unwrap_err();
        assert!(matches!(err, EngineError::Oracle(_)));

        engine
            .list_market(EUR_USD, "EUR/USD", MarketParams::default(), ConstantProductPool::new(dec!(0.003)))
            .unwrap();
        let market = engine.market(EUR_USD).unwrap();
        assert_eq!(market.global.twap.oracle_twap, dec!(1.1));
        // empty pool, market twap starts at the index
        assert_eq!(market.global.twap.market_twap, dec!(1.1));

        let err = engine
            .list_market(EUR_USD, "EUR/USD", MarketParams::default(), ConstantProductPool::new(dec!(0.003)))
            .unwrap_err();
        assert_eq!(err, EngineError::MarketAlreadyListed(EUR_USD));
    }

    #[test]
    fn deposit_and_withdraw_emit_events() {
        let mut engine = engine();
        engine.deposit(ALICE, UA, dec!(100)).unwrap();
        engine.withdraw(ALICE, UA, dec!(40)).unwrap();
        assert_eq!(engine.vault().get_balance(ALICE, UA), dec!(60));
        assert!(matches!(engine.events()[0].payload, EventPayload::Deposit(_)));
        assert!(matches!(engine.events()[1].payload, EventPayload::Withdrawal(_)));
    }

    #[test]
    fn failed_operation_leaves_no_trace() {
        let mut engine = engine();
        engine.deposit(ALICE, UA, dec!(10)).unwrap();
        let events_before = engine.events().len();
        assert!(engine.withdraw(ALICE, UA, dec!(11)).is_err());
        assert_eq!(engine.vault().get_balance(ALICE, UA), dec!(10));
        assert_eq!(engine.events().len(), events_before);
    }

    #[test]
    fn insurance_funding_pays_debt_first() {
        let mut engine = engine();
        engine.settle_bad_debt(dec!(30));
        assert_eq!(engine.insurance().system_bad_debt(), dec!(30));

        engine.fund_insurance(dec!(50)).unwrap();
        assert_eq!(engine.insurance().system_bad_debt(), Decimal::ZERO);
        assert_eq!(engine.insurance().balance(), dec!(20));
        let debt_events = engine
            .events()
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::SystemDebtChanged(_)))
            .count();
        assert_eq!(debt_events, 2);
    }

    #[test]
    fn fee_growth_overflow_is_an_error() {
        let mut engine = engine();
        engine
            .list_market(EUR_USD, "EUR/USD", MarketParams::default(), ConstantProductPool::new(dec!(0.003)))
            .unwrap();
        engine.deposit(ALICE, UA, dec!(10_000)).unwrap();
        engine
            .provide_liquidity(ALICE, EUR_USD, [dec!(1_000), dec!(1_000)], Decimal::ZERO)
            .unwrap();

        engine.market_mut(EUR_USD).unwrap().global.fee_growth.total_trading_fees_growth = Decimal::MAX;
        let err = engine.credit_trading_fee(EUR_USD, dec!(100_000)).unwrap_err();
        assert_eq!(err, EngineError::Math(MathError::Overflow));
    }

    #[test]
    fn insurance_can_start_seeded() {
        let config = EngineConfig {
            initial_insurance: dec!(500),
            ..EngineConfig::default()
        };
        let engine = TestEngine::new(config, ClearingHouseParams::default(), FeedOracle::default()).unwrap();
        assert_eq!(engine.insurance().balance(), dec!(500));
        assert_eq!(engine.vault().collateral(UA).unwrap().symbol, "UA");
    }

    #[test]
    fn event_log_is_capped() {
        let mut oracle = FeedOracle::default();
        oracle.set_fixed_price(EUR_USD, dec!(1));
        let config = EngineConfig {
            max_events: 3,
            ..EngineConfig::default()
        };
        let mut engine = TestEngine::new(config, ClearingHouseParams::default(), oracle).unwrap();
        for _ in 0..5 {
            engine.deposit(ALICE, UA, dec!(1)).unwrap();
        }
        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.events()[0].id, EventId(3));
        assert_eq!(engine.recent_events(1)[0].id, EventId(5));
    }
}
