// 11.0: every committed state change produces an event. events from a rolled back
// operation are dropped with it. the EventPayload enum lists all event types.

use crate::types::{AccountId, MarketId, PositionKind, Side, Timestamp};
use crate::vault::CollateralIdx;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Market events
    MarketListed(MarketListedEvent),
    TwapUpdated(TwapUpdatedEvent),
    FundingRateUpdated(FundingRateUpdatedEvent),

    // Trading events
    ChangePosition(ChangePositionEvent),
    DustGenerated(DustGeneratedEvent),

    // Liquidity events
    LiquidityProvided(LiquidityProvidedEvent),
    LiquidityRemoved(LiquidityRemovedEvent),

    // Risk events
    LiquidationCall(LiquidationCallEvent),
    SeizeCollateral(SeizeCollateralEvent),
    SystemDebtChanged(SystemDebtChangedEvent),

    // Vault and insurance events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    InsuranceFunded(InsuranceFundedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListedEvent {
    pub market: MarketId,
    pub name: String,
    pub index_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapUpdatedEvent {
    pub market: MarketId,
    pub oracle_twap: Decimal,
    pub market_twap: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRateUpdatedEvent {
    pub market: MarketId,
    pub funding_rate: Decimal,
    pub cum_funding_rate: Decimal,
    pub cum_funding_per_lp_token: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePositionEvent {
    pub market: MarketId,
    pub account: AccountId,
    pub side: Side,
    pub added_open_notional: Decimal,
    pub added_position_size: Decimal,
    pub profit: Decimal,
    pub trading_fee: Decimal,
    pub insurance_fee: Decimal,
    pub is_position_increased: bool,
    pub is_position_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustGeneratedEvent {
    pub market: MarketId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityProvidedEvent {
    pub market: MarketId,
    pub account: AccountId,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub tokens_minted: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRemovedEvent {
    pub market: MarketId,
    pub account: AccountId,
    pub reduction_ratio: Decimal,
    pub profit: Decimal,
    pub trading_fees_paid: Decimal,
    pub is_position_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationCallEvent {
    pub market: MarketId,
    pub account: AccountId,
    pub liquidator: AccountId,
    pub kind: PositionKind,
    pub notional_liquidated: Decimal,
    pub reward: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeizeCollateralEvent {
    pub account: AccountId,
    pub liquidator: AccountId,
    pub debt_covered: Decimal,
    pub debt_socialized: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDebtChangedEvent {
    pub new_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account: AccountId,
    pub collateral: CollateralIdx,
    pub amount: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account: AccountId,
    pub collateral: CollateralIdx,
    pub amount: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceFundedEvent {
    pub amount: Decimal,
    pub debt_repaid: Decimal,
}
