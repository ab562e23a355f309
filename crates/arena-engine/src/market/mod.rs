//! Market-data capability.
//!
//! The engine consumes a single price-lookup capability; each venue is
//! one adapter. Prices flow through the TTL cache, which publishes a
//! complete snapshot atomically once per refresh tick.

pub mod binance;
pub mod cache;
pub mod scripted;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use binance::{BinanceConfig, BinanceMarketData};
pub use cache::PriceCache;
pub use scripted::ScriptedMarketData;

/// Errors from a market-data venue.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("venue request failed: {0}")]
    Transport(String),

    #[error("venue returned an unusable payload: {0}")]
    Payload(String),

    #[error("no price available for {0}")]
    Unavailable(String),
}

/// One mid quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub as_of: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(price: Decimal, as_of: DateTime<Utc>) -> Self {
        Self { price, as_of }
    }
}

/// One OHLCV candle, used for prompt and API enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Market-data venue capability.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest mid quotes for the given symbols. Symbols the venue does
    /// not know are absent from the result rather than an error.
    async fn latest_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceQuote>, MarketError>;

    /// Recent OHLCV candles for one symbol.
    async fn ohlcv(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError>;
}
