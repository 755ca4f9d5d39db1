//! Liquidation and bad-debt handling.
//!
//! `liquidate` force-closes one position of an account whose margin ratio fell
//! below `min_margin` and charges the liquidation reward. Once an account holds
//! no position anywhere, a negative net reserve is cleared and settled through
//! the insurance reserve. `seize_collateral` lets a liquidator buy non-UA
//! collateral at a discount to cover a UA debt the account can no longer
//! trade out of.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult, SeizeCollateralResult, SeizedCollateral};
use super::trading::TradeMode;
use crate::amm::AmmAdapter;
use crate::events::{EventPayload, LiquidationCallEvent, SeizeCollateralEvent};
use crate::math;
use crate::oracle::PriceOracle;
use crate::types::{AccountId, MarketId, PositionKind};
use crate::vault::UA;
use rust_decimal::Decimal;
use tracing::{info, warn};

impl<A: AmmAdapter, O: PriceOracle> Engine<A, O> {
    /// Closes the account's `kind` position on `market_id`. for a trader long
    /// `proposed_amount` is the base to sell, for a short the quote to buy back
    /// with, for an LP the offsetting swap of the full withdrawal.
    pub fn liquidate(
        &mut self,
        liquidator: AccountId,
        market_id: MarketId,
        account: AccountId,
        proposed_amount: Decimal,
        kind: PositionKind,
    ) -> Result<LiquidationResult, EngineError> {
        self.atomically(|engine| {
            engine.refresh_for(account, market_id)?;

            let market = engine.market(market_id)?;
            let (notional, trader_side, lp_balance) = match kind {
                PositionKind::Trader => {
                    let position = market.trader(account).ok_or(EngineError::LiquidateInvalidPosition)?;
                    (position.open_notional.abs(), position.side(), Decimal::ZERO)
                }
                PositionKind::LiquidityProvider => {
                    let position = market.lp(account).ok_or(EngineError::LiquidateInvalidPosition)?;
                    (position.open_notional.abs(), None, position.liquidity_balance)
                }
            };

            if engine.is_valid_margin(account, engine.params.min_margin)? {
                return Err(EngineError::LiquidateValidMargin);
            }

            let profit = match (kind, trader_side) {
                (PositionKind::Trader, Some(side)) => {
                    if proposed_amount <= Decimal::ZERO {
                        return Err(EngineError::LiquidateInsufficientProposedAmount);
                    }
                    engine
                        .trade(
                            account,
                            market_id,
                            proposed_amount,
                            Decimal::ZERO,
                            side.opposite(),
                            TradeMode::Liquidation,
                        )?
                        .profit
                }
                (PositionKind::Trader, None) => return Err(EngineError::LiquidateInvalidPosition),
                (PositionKind::LiquidityProvider, _) => {
                    engine
                        .remove_liquidity_inner(
                            account,
                            market_id,
                            lp_balance,
                            [Decimal::ZERO; 2],
                            proposed_amount,
                            Decimal::ZERO,
                            TradeMode::Liquidation,
                        )?
                        .profit
                }
            };

            let reward = math::wad_mul(notional, engine.params.liquidation_reward)?;
            let insurance_reward = math::wad_mul(reward, engine.params.liquidation_reward_insurance_share)?;
            let liquidator_reward = reward - insurance_reward;
            engine.ledger.vault.adjust_balance(account, UA, -reward)?;
            engine.ledger.vault.adjust_balance(liquidator, UA, liquidator_reward)?;
            engine.credit_insurance(insurance_reward);

            info!(
                market = %market_id,
                %account,
                %liquidator,
                ?kind,
                %notional,
                %reward,
                "position liquidated"
            );
            engine.emit_event(EventPayload::LiquidationCall(LiquidationCallEvent {
                market: market_id,
                account,
                liquidator,
                kind,
                notional_liquidated: notional,
                reward,
            }));

            let bad_debt = if engine.has_any_position(account) {
                Decimal::ZERO
            } else {
                engine.clear_bad_debt(account)?
            };

            Ok(LiquidationResult {
                market: market_id,
                account,
                liquidator,
                kind,
                notional_liquidated: notional,
                profit,
                reward,
                liquidator_reward,
                insurance_reward,
                bad_debt,
            })
        })
    }

    /// Zeroes an account whose collateral is worth less than nothing and hands
    /// the deficit to the insurance reserve. returns the deficit.
    fn clear_bad_debt(&mut self, account: AccountId) -> Result<Decimal, EngineError> {
        let reserve = self.ledger.vault.get_reserve_value(account, false)?;
        if reserve >= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let debt = -reserve;
        self.ledger.vault.clear_account(account)?;
        let settlement = self.settle_bad_debt(debt);
        warn!(
            %account,
            %debt,
            covered = %settlement.covered,
            shortfall = %settlement.shortfall,
            "bad debt cleared"
        );
        Ok(debt)
    }

    pub fn seize_collateral(
        &mut self,
        liquidator: AccountId,
        account: AccountId,
    ) -> Result<SeizeCollateralResult, EngineError> {
        self.atomically(|engine| {
            if engine.has_any_position(account) {
                return Err(EngineError::SeizeCollateralStillOpen);
            }
            let ua_balance = engine.ledger.vault.get_balance(account, UA);
            if ua_balance >= Decimal::ZERO {
                return Err(EngineError::LiquidationDebtSizeZero);
            }
            let debt = -ua_balance;
            let collateral_value = engine.ledger.vault.non_ua_value(account, true)?;
            if collateral_value > debt && debt < engine.params.ua_debt_seizure_threshold {
                return Err(EngineError::SufficientUserCollateral);
            }

            let mut remaining = debt;
            let mut seized = Vec::new();
            let collateral_count = engine.ledger.vault.collaterals().len();
            for idx in (UA + 1)..collateral_count {
                if remaining <= Decimal::ZERO {
                    break;
                }
                let balance = engine.ledger.vault.get_balance(account, idx);
                if balance <= Decimal::ZERO {
                    continue;
                }
                let price = engine.ledger.vault.collateral(idx)?.price;
                let partial_price = math::wad_mul(price, engine.params.non_ua_coll_seizure_discount)?;
                let needed = math::wad_div(remaining, partial_price)?;
                // whole balance at the mild discount, or just enough of it at the steep one
                let (amount, paid) = if needed >= balance {
                    let full_price = math::wad_mul(price, engine.params.liquidation_discount)?;
                    (balance, math::wad_mul(balance, full_price)?)
                } else {
                    (needed, remaining)
                };

                let available = engine.ledger.vault.get_balance(liquidator, UA);
                if available < paid {
                    return Err(EngineError::LiquidatorInsufficientBalance {
                        required: paid,
                        available,
                    });
                }
                engine.ledger.vault.transfer(account, liquidator, idx, amount)?;
                engine.ledger.vault.transfer(liquidator, account, UA, paid)?;
                remaining = (remaining - paid).max(Decimal::ZERO);
                seized.push(SeizedCollateral {
                    collateral: idx,
                    amount,
                    paid,
                });
            }

            let ua_after = engine.ledger.vault.get_balance(account, UA);
            let debt_socialized = if ua_after < Decimal::ZERO {
                let shortfall = -ua_after;
                engine.ledger.vault.adjust_balance(account, UA, shortfall)?;
                engine.settle_bad_debt(shortfall);
                shortfall
            } else {
                Decimal::ZERO
            };
            let debt_covered = debt - debt_socialized;

            info!(%account, %liquidator, %debt, %debt_covered, %debt_socialized, "collateral seized");
            engine.emit_event(EventPayload::SeizeCollateral(SeizeCollateralEvent {
                account,
                liquidator,
                debt_covered,
                debt_socialized,
            }));
            Ok(SeizeCollateralResult {
                debt,
                seized,
                debt_covered,
                debt_socialized,
            })
        })
    }
}
