// 9.0 oracle.rs: index prices for funding, margin and liquidation.
//
// The clearing house never trusts a price it cannot vouch for: any staleness or
// validity problem is an error and price-dependent operations fail closed.
// FeedOracle models round-based push feeds with a heartbeat, plus an L2
// sequencer uptime feed and a grace period after the sequencer comes back.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{MarketId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("sequencer is down")]
    SequencerDown,

    #[error("sequencer grace period runs until {ends_at}")]
    GracePeriodNotOver { ends_at: Timestamp },

    #[error("price updated at {updated_at} is older than the {heartbeat_secs}s heartbeat")]
    DataNotFresh { updated_at: Timestamp, heartbeat_secs: u64 },

    #[error("round timestamp {updated_at} is invalid")]
    InvalidRoundTimestamp { updated_at: Timestamp },

    #[error("round price {price} is not positive")]
    InvalidRoundPrice { price: Decimal },

    #[error("no price feed for {0}")]
    FeedNotFound(MarketId),
}

/// Source of index prices.
pub trait PriceOracle {
    fn index_price(&self, market: MarketId, now: Timestamp) -> Result<Decimal, OracleError>;
}

/// Latest round reported by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub price: Decimal,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    pub latest: RoundData,
    pub heartbeat_secs: u64,
}

impl PriceFeed {
    fn validated_price(&self, now: Timestamp) -> Result<Decimal, OracleError> {
        let round = self.latest;
        if round.updated_at.as_secs() == 0 || round.updated_at > now {
            return Err(OracleError::InvalidRoundTimestamp {
                updated_at: round.updated_at,
            });
        }
        if round.price <= Decimal::ZERO {
            return Err(OracleError::InvalidRoundPrice { price: round.price });
        }
        if now.secs_since(round.updated_at) > self.heartbeat_secs {
            return Err(OracleError::DataNotFresh {
                updated_at: round.updated_at,
                heartbeat_secs: self.heartbeat_secs,
            });
        }
        Ok(round.price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerStatus {
    pub is_up: bool,
    /// When the current status started.
    pub since: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOracle {
    feeds: HashMap<MarketId, PriceFeed>,
    sequencer: Option<SequencerStatus>,
    grace_period_secs: u64,
    // test overrides, skip every freshness check
    fixed_prices: HashMap<MarketId, Decimal>,
}

impl Default for FeedOracle {
    fn default() -> Self {
        Self::new(3600)
    }
}

impl FeedOracle {
    pub fn new(grace_period_secs: u64) -> Self {
        Self {
            feeds: HashMap::new(),
            sequencer: None,
            grace_period_secs,
            fixed_prices: HashMap::new(),
        }
    }

    pub fn add_feed(&mut self, market: MarketId, heartbeat_secs: u64) {
        self.feeds.insert(
            market,
            PriceFeed {
                latest: RoundData {
                    price: Decimal::ZERO,
                    updated_at: Timestamp::default(),
                },
                heartbeat_secs,
            },
        );
    }

    /// Push a new round. registers the feed with a one hour heartbeat if unknown.
    pub fn submit_round(&mut self, market: MarketId, price: Decimal, updated_at: Timestamp) {
        let feed = self.feeds.entry(market).or_insert(PriceFeed {
            latest: RoundData {
                price,
                updated_at,
            },
            heartbeat_secs: 3600,
        });
        feed.latest = RoundData { price, updated_at };
    }

    pub fn set_sequencer_status(&mut self, is_up: bool, since: Timestamp) {
        self.sequencer = Some(SequencerStatus { is_up, since });
    }

    pub fn set_fixed_price(&mut self, market: MarketId, price: Decimal) {
        self.fixed_prices.insert(market, price);
    }

    pub fn clear_fixed_price(&mut self, market: MarketId) {
        self.fixed_prices.remove(&market);
    }

    fn check_sequencer(&self, now: Timestamp) -> Result<(), OracleError> {
        let Some(status) = self.sequencer else {
            return Ok(());
        };
        if !status.is_up {
            return Err(OracleError::SequencerDown);
        }
        let ends_at = status.since.plus_secs(self.grace_period_secs);
        if now <= ends_at {
            return Err(OracleError::GracePeriodNotOver { ends_at });
        }
        Ok(())
    }
}

impl PriceOracle for FeedOracle {
    fn index_price(&self, market: MarketId, now: Timestamp) -> Result<Decimal, OracleError> {
        if let Some(price) = self.fixed_prices.get(&market) {
            return Ok(*price);
        }
        self.check_sequencer(now)?;
        let feed = self.feeds.get(&market).ok_or(OracleError::FeedNotFound(market))?;
        feed.validated_price(now)
    }
}
