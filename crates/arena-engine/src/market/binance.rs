//! Binance REST venue adapter.
//!
//! Pulls mid quotes from `/api/v3/ticker/price` and candles from
//! `/api/v3/klines`. Public endpoints only; no signing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{Candle, MarketData, MarketError, PriceQuote};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Configuration for the Binance adapter.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Ticker price payload from `/api/v3/ticker/price`.
#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: Decimal,
}

/// Binance REST client.
pub struct BinanceMarketData {
    config: BinanceConfig,
    http: reqwest::Client,
}

impl BinanceMarketData {
    pub fn new(config: BinanceConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Build the `symbols=["A","B"]` query value the ticker endpoint
    /// expects.
    fn symbols_param(symbols: &[String]) -> String {
        let quoted: Vec<String> = symbols.iter().map(|s| format!("\"{}\"", s)).collect();
        format!("[{}]", quoted.join(","))
    }
}

#[async_trait]
impl MarketData for BinanceMarketData {
    async fn latest_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceQuote>, MarketError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/api/v3/ticker/price", self.config.base_url);
        debug!(count = symbols.len(), "fetching binance ticker prices");

        let response = self
            .http
            .get(url)
            .query(&[("symbols", Self::symbols_param(symbols))])
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Transport(format!(
                "ticker request returned {}",
                response.status()
            )));
        }

        let tickers: Vec<TickerPrice> = response
            .json()
            .await
            .map_err(|e| MarketError::Payload(e.to_string()))?;

        let as_of = Utc::now();
        Ok(tickers
            .into_iter()
            .map(|t| (t.symbol, PriceQuote::new(t.price, as_of)))
            .collect())
    }

    async fn ohlcv(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError> {
        let url = format!("{}/api/v3/klines", self.config.base_url);

        let response = self
            .http
            .get(url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", &limit.to_string()),
            ])
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| MarketError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Transport(format!(
                "klines request returned {}",
                response.status()
            )));
        }

        // Klines come back as positional arrays:
        // [open_time, open, high, low, close, volume, ...]
        let rows: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| MarketError::Payload(e.to_string()))?;

        rows.into_iter().map(parse_kline_row).collect()
    }
}

fn parse_kline_row(row: Vec<serde_json::Value>) -> Result<Candle, MarketError> {
    if row.len() < 6 {
        return Err(MarketError::Payload(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| MarketError::Payload("kline open time is not an integer".to_string()))?;
    let open_time = Utc
        .timestamp_millis_opt(open_time_ms)
        .single()
        .ok_or_else(|| MarketError::Payload("kline open time out of range".to_string()))?;

    let decimal_at = |idx: usize, name: &str| -> Result<Decimal, MarketError> {
        row[idx]
            .as_str()
            .ok_or_else(|| MarketError::Payload(format!("kline {} is not a string", name)))?
            .parse::<Decimal>()
            .map_err(|e| MarketError::Payload(format!("kline {}: {}", name, e)))
    };

    Ok(Candle {
        open_time,
        open: decimal_at(1, "open")?,
        high: decimal_at(2, "high")?,
        low: decimal_at(3, "low")?,
        close: decimal_at(4, "close")?,
        volume: decimal_at(5, "volume")?,
    })
}

impl std::fmt::Debug for BinanceMarketData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceMarketData")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_symbols_param() {
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        assert_eq!(
            BinanceMarketData::symbols_param(&symbols),
            r#"["BTCUSDT","ETHUSDT"]"#
        );
    }

    #[test]
    fn test_ticker_price_parsing() {
        let raw = json!({"symbol": "BTCUSDT", "price": "97123.45000000"});
        let ticker: TickerPrice = serde_json::from_value(raw).unwrap();
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.price, dec!(97123.45));
    }

    #[test]
    fn test_parse_kline_row() {
        let row = vec![
            json!(1717320600000i64),
            json!("68000.00"),
            json!("68100.00"),
            json!("67900.00"),
            json!("68050.00"),
            json!("12.5"),
            json!(1717321499999i64),
        ];
        let candle = parse_kline_row(row).unwrap();
        assert_eq!(candle.open, dec!(68000));
        assert_eq!(candle.close, dec!(68050));
        assert_eq!(candle.volume, dec!(12.5));
    }

    #[test]
    fn test_parse_kline_row_too_short() {
        assert!(parse_kline_row(vec![json!(0)]).is_err());
    }
}
