//! Scripted venue for dry runs and tests.
//!
//! Prices are set by the harness instead of a live feed; the adapter
//! answers like a real venue so the whole refresh/validate/execute path
//! can run without network access.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::{Candle, MarketData, MarketError, PriceQuote};

/// In-memory venue with harness-controlled prices.
#[derive(Debug, Default)]
pub struct ScriptedMarketData {
    prices: RwLock<HashMap<String, Decimal>>,
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    fail_next: RwLock<bool>,
}

impl ScriptedMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or move the price of one symbol.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().insert(symbol.to_string(), price);
    }

    /// Remove a symbol so lookups treat it as unknown.
    pub fn clear_price(&self, symbol: &str) {
        self.prices.write().remove(symbol);
    }

    /// Seed candles served by `ohlcv`.
    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles.write().insert(symbol.to_string(), candles);
    }

    /// Make the next venue call fail with a transport error.
    pub fn fail_next(&self) {
        *self.fail_next.write() = true;
    }

    fn take_failure(&self) -> bool {
        std::mem::take(&mut *self.fail_next.write())
    }
}

#[async_trait]
impl MarketData for ScriptedMarketData {
    async fn latest_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceQuote>, MarketError> {
        if self.take_failure() {
            return Err(MarketError::Transport("scripted failure".to_string()));
        }
        let as_of = Utc::now();
        let prices = self.prices.read();
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (s.clone(), PriceQuote::new(*p, as_of))))
            .collect())
    }

    async fn ohlcv(
        &self,
        symbol: &str,
        _interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError> {
        if self.take_failure() {
            return Err(MarketError::Transport("scripted failure".to_string()));
        }
        let candles = self.candles.read();
        let series = candles
            .get(symbol)
            .ok_or_else(|| MarketError::Unavailable(symbol.to_string()))?;
        Ok(series.iter().rev().take(limit as usize).rev().copied().collect())
    }
}
