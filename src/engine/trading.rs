// 8.4 engine/trading.rs: trader side. every trade goes through the pool at the
// ex-fee output, pays the trading fee to LPs and the insurance fee to the reserve. reversal through change_position is refused, see open_reverse_position.

use super::core::Engine;
use super::results::{ChangePositionResult, EngineError, ReversePositionResult};
use crate::amm::{self, AmmAdapter};
use crate::dust::{self, DustAction};
use crate::events::{ChangePositionEvent, DustGeneratedEvent, EventPayload};
use crate::funding;
use crate::math::{self, MathError};
use crate::oracle::PriceOracle;
use crate::position::TraderPosition;
use crate::types::{AccountId, MarketId, Side, TokenIndex};
use crate::vault::UA;
use rust_decimal::Decimal;
use tracing::debug;

/// Who is driving a trade. liquidations skip the block cap and must close fully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TradeMode {
    Normal,
    Liquidation,
}

/// Both legs of an executed swap, at the ex-fee output.
#[derive(Debug, Clone, Copy)]
pub(super) struct TradeLegs {
    pub(super) quote: Decimal,
    pub(super) base: Decimal,
    pub(super) fee_percentage: Decimal,
}

impl TradeLegs {
    pub(super) fn trading_fee(&self) -> Result<Decimal, MathError> {
        math::wad_mul(self.quote, self.fee_percentage)
    }
}

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    /// Trades `amount` against the pool: quote sold for a long, base sold for a
    /// short. fails if the ex-fee proceeds fall below `min_amount`.
    pub fn change_position(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amount: Decimal,
        min_amount: Decimal,
        side: Side,
    ) -> Result<ChangePositionResult, EngineError> {
        self.atomically(|engine| {
            engine.refresh_for(account, market_id)?;
            engine.trade(account, market_id, amount, min_amount, side, TradeMode::Normal)
        })
    }

    /// Closes the current position and opens `new_side` in one transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn open_reverse_position(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        close_amount: Decimal,
        close_min: Decimal,
        open_amount: Decimal,
        open_min: Decimal,
        new_side: Side,
    ) -> Result<ReversePositionResult, EngineError> {
        self.atomically(|engine| {
            engine.refresh_for(account, market_id)?;
            let current = engine.market(market_id)?.trader(account).and_then(TraderPosition::side);
            if current != Some(new_side.opposite()) {
                return Err(EngineError::NoPositionToReverse);
            }

            let close = engine.trade(account, market_id, close_amount, close_min, new_side, TradeMode::Normal)?;
            if let Some(position) = engine.market(market_id)?.trader(account) {
                return Err(EngineError::ReverseCloseIncomplete {
                    remaining_size: position.position_size,
                });
            }
            let open = engine.trade(account, market_id, open_amount, open_min, new_side, TradeMode::Normal)?;
            Ok(ReversePositionResult { close, open })
        })
    }

    pub(super) fn trade(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amount: Decimal,
        min_amount: Decimal,
        side: Side,
        mode: TradeMode,
    ) -> Result<ChangePositionResult, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::ZeroAmount);
        }
        let position = self.market(market_id)?.trader(account).cloned().unwrap_or_default();
        match position.side() {
            Some(current) if current != side => {
                self.reduce_position(account, market_id, position, amount, min_amount, side, mode)
            }
            _ if mode == TradeMode::Liquidation => Err(EngineError::LiquidateInvalidPosition),
            _ => self.extend_position(account, market_id, position, amount, min_amount, side),
        }
    }

    fn extend_position(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        mut position: TraderPosition,
        amount: Decimal,
        min_amount: Decimal,
        side: Side,
    ) -> Result<ChangePositionResult, EngineError> {
        let min_notional = self.params.min_positive_open_notional;
        let legs = self.swap_against_pool(market_id, side, amount, min_amount, true)?;
        let trading_fee = legs.trading_fee()?;

        let market = self.market_mut(market_id)?;
        let insurance_fee = math::wad_mul(legs.quote, market.params.insurance_fee)?;
        let funding = funding::settle_trader_funding(&mut position, &market.global)?;
        let size_before = position.position_size;
        position.extend(side, legs.quote, legs.base)?;

        if position.open_notional.abs() < min_notional {
            return Err(EngineError::UnderOpenNotionalAmountRequired {
                open_notional: position.open_notional,
                minimum: min_notional,
            });
        }
        if position.position_size.abs() > market.params.max_position {
            return Err(EngineError::MaxPositionSize {
                size: position.position_size,
                max: market.params.max_position,
            });
        }
        funding::apply_size_change(&mut market.global, size_before, position.position_size);
        market.traders.insert(account, position);

        self.credit_trading_fee(market_id, trading_fee)?;
        let profit = funding - trading_fee;
        self.ledger.vault.adjust_balance(account, UA, profit - insurance_fee)?;
        self.credit_insurance(insurance_fee);

        if !self.is_valid_margin(account, self.params.min_margin_at_creation)? {
            return Err(EngineError::ExtendPositionInsufficientMargin);
        }

        let result = ChangePositionResult {
            side,
            quote_amount: legs.quote,
            base_amount: legs.base,
            realized_pnl: Decimal::ZERO,
            funding,
            trading_fee,
            insurance_fee,
            profit,
            is_position_increased: true,
            is_position_closed: false,
            dust: Decimal::ZERO,
        };
        self.emit_change_position(market_id, account, &result);
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn reduce_position(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        mut position: TraderPosition,
        amount: Decimal,
        min_amount: Decimal,
        side: Side,
        mode: TradeMode,
    ) -> Result<ChangePositionResult, EngineError> {
        let min_notional = self.params.min_positive_open_notional;
        let legs = self.swap_against_pool(market_id, side, amount, min_amount, mode == TradeMode::Normal)?;
        let trading_fee = legs.trading_fee()?;

        let market = self.market_mut(market_id)?;
        let insurance_fee = math::wad_mul(legs.quote, market.params.insurance_fee)?;
        let threshold = market.params.dust_threshold;
        let funding = funding::settle_trader_funding(&mut position, &market.global)?;
        let size_before = position.position_size;
        let abs_size = size_before.abs();

        // base traded past zero belongs to the protocol, anything bigger is a reversal
        let mut dust = Decimal::ZERO;
        let closed_notional = if legs.base > abs_size {
            let overshoot = legs.base - abs_size;
            if overshoot > threshold {
                return Err(match mode {
                    TradeMode::Liquidation => EngineError::LiquidateExcessiveProposedAmount { overshoot, threshold },
                    TradeMode::Normal => EngineError::AttemptReversePosition,
                });
            }
            dust = side.signed_size(overshoot);
            position.reduce(abs_size)?
        } else {
            position.reduce(legs.base)?
        };
        let mut realized_pnl = math::checked_add(side.signed_notional(legs.quote), closed_notional)?;

        if !position.is_empty() {
            let remaining = position.position_size;
            let below_minimum = position.open_notional.abs() < min_notional;
            if mode == TradeMode::Liquidation || below_minimum {
                if remaining.abs() > threshold {
                    return Err(match mode {
                        TradeMode::Liquidation => EngineError::LiquidateInsufficientProposedAmount,
                        TradeMode::Normal => EngineError::UnderOpenNotionalAmountRequired {
                            open_notional: position.open_notional,
                            minimum: min_notional,
                        },
                    });
                }
                // the protocol takes the leftover size at zero cost
                realized_pnl += position.open_notional;
                dust += remaining;
                position = TraderPosition::default();
            }
        }

        funding::apply_size_change(&mut market.global, size_before, position.position_size);
        let is_position_closed = position.is_empty();
        if is_position_closed {
            market.traders.remove(&account);
        } else {
            market.traders.insert(account, position);
        }

        self.credit_trading_fee(market_id, trading_fee)?;
        let profit = realized_pnl + funding - trading_fee;
        self.ledger.vault.adjust_balance(account, UA, profit - insurance_fee)?;
        self.credit_insurance(insurance_fee);

        let result = ChangePositionResult {
            side,
            quote_amount: legs.quote,
            base_amount: legs.base,
            realized_pnl,
            funding,
            trading_fee,
            insurance_fee,
            profit,
            is_position_increased: false,
            is_position_closed,
            dust,
        };
        self.emit_change_position(market_id, account, &result);
        self.settle_dust(market_id, dust)?;
        Ok(result)
    }

    /// Executes a swap and records its in-kind pool fee per LP share. `capped`
    /// swaps count toward the market's per-timestamp trade limit.
    pub(super) fn swap_against_pool(
        &mut self,
        market_id: MarketId,
        side: Side,
        amount_in: Decimal,
        min_out: Decimal,
        capped: bool,
    ) -> Result<TradeLegs, EngineError> {
        let now = self.current_time;
        let market = self.market_mut(market_id)?;
        let (sell, buy) = side.swap_direction();
        let fill = amm::execute_swap(&mut market.pool, sell, buy, amount_in)?;
        if fill.amount_out_ex_fees < min_out {
            return Err(EngineError::Slippage {
                minimum: min_out,
                actual: fill.amount_out_ex_fees,
            });
        }

        let (quote, base) = match side {
            Side::Long => (amount_in, fill.amount_out_ex_fees),
            Side::Short => (fill.amount_out_ex_fees, amount_in),
        };
        if capped {
            let traded = market.block_trades.traded_at(now) + quote;
            if traded > market.params.max_block_trade_amount {
                return Err(EngineError::ExcessiveBlockTradeAmount {
                    traded,
                    max: market.params.max_block_trade_amount,
                });
            }
            market.block_trades.record(now, quote);
        }

        let in_kind_fee = fill.in_kind_fee();
        let total_shares = market.pool.total_shares();
        if in_kind_fee > Decimal::ZERO && !total_shares.is_zero() {
            let growth = math::wad_div(in_kind_fee, total_shares)?;
            let fee_growth = &mut market.global.fee_growth;
            let index = match buy {
                TokenIndex::Quote => &mut fee_growth.total_quote_fees_growth,
                TokenIndex::Base => &mut fee_growth.total_base_fees_growth,
            };
            *index = math::checked_add(*index, growth)?;
        }

        Ok(TradeLegs {
            quote,
            base,
            fee_percentage: fill.fee_percentage,
        })
    }

    /// Pays a trading fee to the market's LPs. with no LP left it goes to insurance.
    pub(super) fn credit_trading_fee(&mut self, market_id: MarketId, fee: Decimal) -> Result<(), EngineError> {
        if fee <= Decimal::ZERO {
            return Ok(());
        }
        let market = self.market_mut(market_id)?;
        let total_liquidity = market.total_liquidity();
        if total_liquidity.is_zero() {
            self.credit_insurance(fee);
            return Ok(());
        }
        let growth = math::wad_div(fee, total_liquidity)?;
        let index = &mut market.global.fee_growth.total_trading_fees_growth;
        *index = math::checked_add(*index, growth)?;
        Ok(())
    }

    // 8.4.1: dust. small residuals are parked on the market's dust position and
    // closed right away. the result of closing it lands in the insurance reserve.
    pub(super) fn settle_dust(&mut self, market_id: MarketId, residual: Decimal) -> Result<(), EngineError> {
        let threshold = self.market(market_id)?.params.dust_threshold;
        match dust::classify(residual, threshold) {
            DustAction::None => Ok(()),
            DustAction::Reject { residual, threshold } => Err(EngineError::ExcessiveDust { residual, threshold }),
            DustAction::Settle(amount) => {
                self.market_mut(market_id)?.dust.position_size += amount;
                self.emit_event(EventPayload::DustGenerated(DustGeneratedEvent {
                    market: market_id,
                    amount,
                }));
                self.close_dust(market_id)
            }
        }
    }

    fn close_dust(&mut self, market_id: MarketId) -> Result<(), EngineError> {
        let market = self.market(market_id)?;
        if market.pool.spot_price().is_none() {
            // parked until the pool is funded again
            debug!(market = %market_id, size = %market.dust.position_size, "dust parked on empty pool");
            return Ok(());
        }
        let dust = market.dust.clone();
        let size = dust.position_size;
        let mut pnl = dust.open_notional;

        if size > Decimal::ZERO {
            let legs = self.swap_against_pool(market_id, Side::Short, size, Decimal::ZERO, false)?;
            let fee = legs.trading_fee()?;
            self.credit_trading_fee(market_id, fee)?;
            pnl += legs.quote - fee;
        } else if size < Decimal::ZERO {
            let target = size.abs();
            let quote_in =
                amm::amount_in_for_exact_out(&self.market(market_id)?.pool, TokenIndex::Quote, TokenIndex::Base, target)?;
            let legs = self.swap_against_pool(market_id, Side::Long, quote_in, target, false)?;
            let fee = legs.trading_fee()?;
            self.credit_trading_fee(market_id, fee)?;
            pnl -= legs.quote + fee;

            let leftover = legs.base - target;
            if leftover > Decimal::ZERO {
                let back = self.swap_against_pool(market_id, Side::Short, leftover, Decimal::ZERO, false)?;
                let fee = back.trading_fee()?;
                self.credit_trading_fee(market_id, fee)?;
                pnl += back.quote - fee;
            }
        }

        self.market_mut(market_id)?.dust = TraderPosition::default();
        if pnl > Decimal::ZERO {
            self.credit_insurance(pnl);
        } else if pnl < Decimal::ZERO {
            self.settle_bad_debt(-pnl);
        }
        debug!(market = %market_id, %size, %pnl, "dust closed");
        Ok(())
    }

    fn emit_change_position(&mut self, market_id: MarketId, account: AccountId, result: &ChangePositionResult) {
        debug!(
            market = %market_id,
            %account,
            side = %result.side,
            quote = %result.quote_amount,
            base = %result.base_amount,
            profit = %result.profit,
            closed = result.is_position_closed,
            "position changed"
        );
        self.emit_event(EventPayload::ChangePosition(ChangePositionEvent {
            market: market_id,
            account,
            side: result.side,
            added_open_notional: result.side.signed_notional(result.quote_amount),
            added_position_size: result.side.signed_size(result.base_amount),
            profit: result.profit,
            trading_fee: result.trading_fee,
            insurance_fee: result.insurance_fee,
            is_position_increased: result.is_position_increased,
            is_position_closed: result.is_position_closed,
        }));
    }
}
