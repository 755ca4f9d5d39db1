// 8.5 engine/liquidity.rs: LP side. an LP supplies virtual quote and base, owes them
// back (open_notional -= quote, position_size -= base) and so holds the inverse of
// whatever traders do against its share of the pool. removal unwinds that exposure
// with one offsetting swap sized by the caller.

use super::core::Engine;
use super::results::{EngineError, ProvideLiquidityResult, RemoveLiquidityResult};
use super::trading::TradeMode;
use crate::amm::AmmAdapter;
use crate::dust::{self, DustAction};
use crate::events::{EventPayload, LiquidityProvidedEvent, LiquidityRemovedEvent};
use crate::funding;
use crate::math;
use crate::oracle::PriceOracle;
use crate::types::{AccountId, MarketId, Side};
use crate::vault::UA;
use rust_decimal::Decimal;
use tracing::debug;

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    /// Deposits `[quote, base]` into the pool. the first deposit sets the price,
    /// later ones must match it within the market's deviation tolerance.
    pub fn provide_liquidity(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        amounts: [Decimal; 2],
        min_lp_amount: Decimal,
    ) -> Result<ProvideLiquidityResult, EngineError> {
        let [quote_amount, base_amount] = amounts;
        if quote_amount < Decimal::ZERO
            || base_amount < Decimal::ZERO
            || (quote_amount.is_zero() && base_amount.is_zero())
        {
            return Err(EngineError::ProvideLiquidityZeroAmount);
        }

        self.atomically(|engine| {
            engine.refresh_for(account, market_id)?;
            let now = engine.current_time;
            let min_notional = engine.params.min_positive_open_notional;
            let index_price = engine.oracle.index_price(market_id, now)?;

            let market = engine.market_mut(market_id)?;
            let pool_price = market.pool.spot_price();
            if let Some(pool_price) = pool_price {
                let deviation = if base_amount.is_zero() {
                    Decimal::MAX
                } else {
                    let ratio = math::wad_div(quote_amount, base_amount)?;
                    (math::wad_div(ratio, pool_price)? - Decimal::ONE).abs()
                };
                if deviation > market.params.lp_deviation_tolerance {
                    return Err(EngineError::LpAmountDeviation {
                        deviation,
                        tolerance: market.params.lp_deviation_tolerance,
                    });
                }
            }

            let deposit_value = quote_amount + math::wad_mul(base_amount, pool_price.unwrap_or(index_price))?;
            if deposit_value < min_notional {
                return Err(EngineError::UnderOpenNotionalAmountRequired {
                    open_notional: deposit_value,
                    minimum: min_notional,
                });
            }
            let provided = market.global.total_quote_provided + quote_amount;
            if provided > market.params.max_liquidity_provided {
                return Err(EngineError::MaxLiquidityProvided {
                    provided,
                    max: market.params.max_liquidity_provided,
                });
            }

            let tokens_minted = market.pool.add_liquidity(amounts, min_lp_amount)?;

            // collect what the existing balance earned before it changes size
            let mut lp = market.lps.get(&account).cloned().unwrap_or_default();
            let (fees_collected, funding) = if lp.is_empty() {
                lp.deposit_time = now;
                lp.fee_growth = market.global.fee_growth;
                lp.cum_funding_per_lp_token = market.global.cum_funding_per_lp_token;
                (Decimal::ZERO, Decimal::ZERO)
            } else {
                let funding = funding::settle_lp_funding(&mut lp, &market.global)?;
                (lp.checkpoint_fees(&market.global.fee_growth)?, funding)
            };

            lp.liquidity_balance += tokens_minted;
            lp.open_notional -= quote_amount;
            lp.position_size -= base_amount;
            lp.quote_provided += quote_amount;
            lp.base_provided += base_amount;
            market.global.total_quote_provided += quote_amount;
            market.global.total_base_provided += base_amount;
            market.lps.insert(account, lp);

            engine.ledger.vault.adjust_balance(account, UA, fees_collected + funding)?;
            if !engine.is_valid_margin(account, engine.params.min_margin_at_creation)? {
                return Err(EngineError::AmountProvidedTooLarge);
            }

            debug!(market = %market_id, %account, %quote_amount, %base_amount, %tokens_minted, "liquidity provided");
            engine.emit_event(EventPayload::LiquidityProvided(LiquidityProvidedEvent {
                market: market_id,
                account,
                quote_amount,
                base_amount,
                tokens_minted,
            }));
            Ok(ProvideLiquidityResult {
                tokens_minted,
                fees_collected,
                funding,
            })
        })
    }

    /// Burns `lp_amount` shares and unwinds the released exposure by swapping
    /// `proposed_amount` (base when net long, quote when net short).
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        lp_amount: Decimal,
        min_amounts: [Decimal; 2],
        proposed_amount: Decimal,
        min_amount: Decimal,
    ) -> Result<RemoveLiquidityResult, EngineError> {
        self.atomically(|engine| {
            engine.refresh_for(account, market_id)?;
            engine.remove_liquidity_inner(
                account,
                market_id,
                lp_amount,
                min_amounts,
                proposed_amount,
                min_amount,
                TradeMode::Normal,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn remove_liquidity_inner(
        &mut self,
        account: AccountId,
        market_id: MarketId,
        lp_amount: Decimal,
        min_amounts: [Decimal; 2],
        proposed_amount: Decimal,
        min_amount: Decimal,
        mode: TradeMode,
    ) -> Result<RemoveLiquidityResult, EngineError> {
        if lp_amount <= Decimal::ZERO {
            return Err(EngineError::ZeroAmount);
        }
        let now = self.current_time;
        let market = self.market_mut(market_id)?;
        let mut lp = market.lps.get(&account).cloned().unwrap_or_default();
        if lp_amount > lp.liquidity_balance {
            return Err(EngineError::LPWithdrawExceedsBalance {
                requested: lp_amount,
                balance: lp.liquidity_balance,
            });
        }
        if mode == TradeMode::Normal {
            let unlock_time = lp.deposit_time.plus_secs(market.params.lock_period_secs);
            if now < unlock_time {
                return Err(EngineError::LockPeriodNotReached { unlock_time });
            }
        }

        let funding = funding::settle_lp_funding(&mut lp, &market.global)?;
        let fees_collected = lp.checkpoint_fees(&market.global.fee_growth)?;

        let is_position_closed = lp_amount == lp.liquidity_balance;
        let reduction_ratio = math::wad_div(lp_amount, lp.liquidity_balance)?;
        let share = |value: Decimal| -> Result<Decimal, math::MathError> {
            if is_position_closed {
                Ok(value)
            } else {
                math::wad_mul(value, reduction_ratio)
            }
        };
        let removed_notional = share(lp.open_notional)?;
        let removed_size = share(lp.position_size)?;
        let removed_quote_provided = share(lp.quote_provided)?;
        let removed_base_provided = share(lp.base_provided)?;

        let [quote_out, base_out] = market.pool.remove_liquidity(lp_amount, min_amounts)?;

        if is_position_closed {
            market.lps.remove(&account);
        } else {
            lp.liquidity_balance -= lp_amount;
            lp.open_notional -= removed_notional;
            lp.position_size -= removed_size;
            lp.quote_provided -= removed_quote_provided;
            lp.base_provided -= removed_base_provided;
            market.lps.insert(account, lp);
        }
        market.global.total_quote_provided -= removed_quote_provided;
        market.global.total_base_provided -= removed_base_provided;

        // released exposure, unwound with one swap
        let net_quote = removed_notional + quote_out;
        let net_base = removed_size + base_out;
        let capped = mode == TradeMode::Normal;
        if proposed_amount < Decimal::ZERO || (net_base.is_zero() && !proposed_amount.is_zero()) {
            return Err(EngineError::InvalidProposedAmount {
                proposed: proposed_amount,
            });
        }
        // no swap leaves the whole net base as residual, fine while it is dust
        let (swap_quote, residual, trading_fee) = if proposed_amount.is_zero() {
            (Decimal::ZERO, net_base, Decimal::ZERO)
        } else if net_base > Decimal::ZERO {
            let legs = self.swap_against_pool(market_id, Side::Short, proposed_amount, min_amount, capped)?;
            (legs.quote, net_base - legs.base, legs.trading_fee()?)
        } else {
            let legs = self.swap_against_pool(market_id, Side::Long, proposed_amount, min_amount, capped)?;
            (-legs.quote, net_base + legs.base, legs.trading_fee()?)
        };
        self.credit_trading_fee(market_id, trading_fee)?;

        let threshold = self.market(market_id)?.params.dust_threshold;
        if let DustAction::Reject { residual, threshold } = dust::classify(residual, threshold) {
            return Err(match mode {
                TradeMode::Liquidation => EngineError::LiquidateInsufficientProposedAmount,
                TradeMode::Normal => EngineError::ExcessiveDust { residual, threshold },
            });
        }

        let profit = net_quote + swap_quote - trading_fee + fees_collected + funding;
        self.ledger.vault.adjust_balance(account, UA, profit)?;

        debug!(
            market = %market_id,
            %account,
            %lp_amount,
            %profit,
            closed = is_position_closed,
            "liquidity removed"
        );
        self.emit_event(EventPayload::LiquidityRemoved(LiquidityRemovedEvent {
            market: market_id,
            account,
            reduction_ratio,
            profit,
            trading_fees_paid: trading_fee,
            is_position_closed,
        }));
        // the LP keeps nothing of the residual, the protocol takes it over
        self.settle_dust(market_id, residual)?;

        Ok(RemoveLiquidityResult {
            quote_out,
            base_out,
            reduction_ratio,
            profit,
            trading_fee,
            fees_collected,
            funding,
            dust: residual,
            is_position_closed,
        })
    }
}
