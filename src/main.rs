//! Clearing house simulation.
//!
//! Walks one EUR/USD market through its lifecycle: liquidity provision,
//! trading against the pool, a funding period, and the liquidation of an
//! underwater short that ends in system bad debt.

use perps_vamm::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type SimEngine = Engine<ConstantProductPool, FeedOracle>;

const EUR_USD: MarketId = MarketId(0);
const LP: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(2);
const BOB: AccountId = AccountId(3);
const WHALE: AccountId = AccountId(4);
const KEEPER: AccountId = AccountId(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    println!("Perpetual Clearing House Simulation");
    println!("One vAMM Market, Cross Margin, Full Lifecycle\n");

    scenario_1_round_trip()?;
    scenario_2_funding_period()?;
    scenario_3_underwater_short()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn setup(params: ClearingHouseParams, market: MarketParams, pool_fee: Decimal) -> Result<SimEngine, EngineError> {
    let mut oracle = FeedOracle::default();
    oracle.set_fixed_price(EUR_USD, dec!(1));
    let mut engine = Engine::new(EngineConfig::default(), params, oracle)?;
    engine.set_time(Timestamp::from_secs(1_000_000));
    engine.list_market(EUR_USD, "EUR/USD", market, ConstantProductPool::new(pool_fee))?;

    engine.deposit(LP, UA, dec!(100_000))?;
    engine.provide_liquidity(LP, EUR_USD, [dec!(100_000), dec!(100_000)], Decimal::ZERO)?;
    Ok(engine)
}

/// Open and close a long, see where the fees went.
fn scenario_1_round_trip() -> Result<(), EngineError> {
    println!("Scenario 1: Round Trip\n");

    let mut engine = setup(ClearingHouseParams::default(), MarketParams::default(), dec!(0.003))?;
    engine.deposit(ALICE, UA, dec!(1_000))?;
    println!("  LP supplies 100,000 quote + 100,000 base at 1.00");
    println!("  Alice deposits 1,000 UA\n");

    let open = engine.change_position(ALICE, EUR_USD, dec!(500), Decimal::ZERO, Side::Long)?;
    println!("  Alice buys {} base for {} quote", open.base_amount, open.quote_amount);
    println!("  trading fee {}, insurance fee {}", open.trading_fee, open.insurance_fee);
    println!("  margin ratio {}\n", engine.margin_ratio(ALICE)?);

    let close_amount = engine.trader_close_amount(ALICE, EUR_USD)?;
    let close = engine.change_position(ALICE, EUR_USD, close_amount, Decimal::ZERO, Side::Short)?;
    println!("  Alice sells {} base for {} quote", close.base_amount, close.quote_amount);
    println!("  realized pnl {}, closed: {}", close.realized_pnl, close.is_position_closed);
    println!("  Alice balance {}", engine.vault().get_balance(ALICE, UA));
    println!("  LP pending pnl {}", engine.lp_unrealized_pnl(LP, EUR_USD)?);
    println!("  insurance {}\n", engine.insurance().balance());
    Ok(())
}

/// Pool trades above the index for a full period, longs pay shorts.
fn scenario_2_funding_period() -> Result<(), EngineError> {
    println!("Scenario 2: Funding Period\n");

    let mut engine = setup(ClearingHouseParams::default(), MarketParams::default(), dec!(0.003))?;
    engine.deposit(ALICE, UA, dec!(10_000))?;
    engine.deposit(BOB, UA, dec!(10_000))?;

    engine.change_position(ALICE, EUR_USD, dec!(5_000), Decimal::ZERO, Side::Long)?;
    engine.change_position(BOB, EUR_USD, dec!(1_000), Decimal::ZERO, Side::Short)?;
    let spot = engine.spot_price(EUR_USD)?.unwrap_or(Decimal::ONE);
    println!("  Alice long 5,000 quote, Bob short 1,000 base");
    println!("  pool price {}, index 1.00\n", spot);

    engine.advance_time(MarketParams::default().twap_frequency_secs);
    let update = engine.update_global_state(EUR_USD)?;
    if let (Some((oracle_twap, market_twap)), Some(rate)) = (update.twap, update.funding_rate) {
        println!("  period rolled: oracle twap {}, market twap {}", oracle_twap, market_twap);
        println!("  funding rate {}", rate);
    }
    println!("  Alice pending funding {}", engine.pending_funding(ALICE, EUR_USD)?);
    println!("  Bob pending funding {}", engine.pending_funding(BOB, EUR_USD)?);
    println!("  LP pending funding {}\n", engine.pending_funding(LP, EUR_USD)?);
    Ok(())
}

/// A whale walks the price through a thin short's margin. the short is
/// liquidated, its loss exceeds its collateral, and insurance is empty.
fn scenario_3_underwater_short() -> Result<(), EngineError> {
    println!("Scenario 3: Underwater Short\n");

    let params = ClearingHouseParams {
        liquidation_reward_insurance_share: Decimal::ZERO,
        ..ClearingHouseParams::default()
    };
    let market = MarketParams {
        insurance_fee: Decimal::ZERO,
        ..MarketParams::default()
    };
    let mut engine = setup(params, market, Decimal::ZERO)?;
    engine.deposit(BOB, UA, dec!(600))?;
    engine.deposit(WHALE, UA, dec!(1_000_000))?;

    engine.change_position(BOB, EUR_USD, dec!(5_000), Decimal::ZERO, Side::Short)?;
    println!("  Bob shorts 5,000 base on 600 UA, margin ratio {}", engine.margin_ratio(BOB)?);

    engine.change_position(WHALE, EUR_USD, dec!(30_000), Decimal::ZERO, Side::Long)?;
    let spot = engine.spot_price(EUR_USD)?.unwrap_or(Decimal::ONE);
    engine.oracle_mut().set_fixed_price(EUR_USD, spot);
    println!("  whale buys 30,000 quote, price now {}", spot);
    println!("  Bob margin ratio {}\n", engine.margin_ratio(BOB)?);

    let proposed = engine.trader_close_amount(BOB, EUR_USD)?;
    let result = engine.liquidate(KEEPER, EUR_USD, BOB, proposed, PositionKind::Trader)?;
    println!("  keeper liquidates {} notional, reward {}", result.notional_liquidated, result.reward);
    println!("  bad debt cleared {}", result.bad_debt);
    println!("  system bad debt {}", engine.insurance().system_bad_debt());

    for event in engine.recent_events(3) {
        println!("  event #{}: {:?}", event.id.0, event.payload);
    }
    Ok(())
}
