//! TTL price cache.
//!
//! The refresh tick publishes a complete symbol→quote snapshot in one
//! atomic swap, so no reader ever sees a mix of old and new marks
//! within a single reprice cycle. Between ticks, `fresh_price` serves
//! the snapshot when it is within TTL and pulls through the venue when
//! it is not; pull-through fills land in an overlay that never disturbs
//! the published snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{MarketData, MarketError, PriceQuote};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Price cache fronting a market-data venue.
pub struct PriceCache {
    venue: Arc<dyn MarketData>,
    ttl: Duration,
    /// Snapshot swapped once per refresh tick.
    snapshot: RwLock<Arc<HashMap<String, PriceQuote>>>,
    /// Pull-through fills between ticks.
    overlay: DashMap<String, PriceQuote>,
}

impl PriceCache {
    pub fn new(venue: Arc<dyn MarketData>, ttl: Duration) -> Self {
        Self {
            venue,
            ttl,
            snapshot: RwLock::new(Arc::new(HashMap::new())),
            overlay: DashMap::new(),
        }
    }

    fn is_fresh(&self, quote: &PriceQuote) -> bool {
        let age = Utc::now().signed_duration_since(quote.as_of);
        age.to_std().map(|age| age <= self.ttl).unwrap_or(true)
    }

    /// Pull the latest quotes for the given symbols from the venue and
    /// publish them as the new snapshot. The previous overlay is
    /// discarded; the swap is atomic from a reader's view.
    pub async fn refresh(&self, symbols: &[String]) -> Result<usize, MarketError> {
        let quotes = self.venue.latest_prices(symbols).await?;
        let count = quotes.len();
        debug!(requested = symbols.len(), received = count, "price refresh");
        *self.snapshot.write() = Arc::new(quotes);
        self.overlay.clear();
        Ok(count)
    }

    /// The currently published snapshot (refresh-tick view).
    pub fn snapshot(&self) -> Arc<HashMap<String, PriceQuote>> {
        Arc::clone(&self.snapshot.read())
    }

    /// Non-blocking lookup: snapshot first, then overlay; stale entries
    /// are not returned.
    pub fn cached_price(&self, symbol: &str) -> Option<PriceQuote> {
        if let Some(quote) = self.snapshot.read().get(symbol) {
            if self.is_fresh(quote) {
                return Some(*quote);
            }
        }
        self.overlay
            .get(symbol)
            .map(|q| *q)
            .filter(|q| self.is_fresh(q))
    }

    /// Cached value if within TTL, else pull through the venue.
    pub async fn fresh_price(&self, symbol: &str) -> Result<PriceQuote, MarketError> {
        if let Some(quote) = self.cached_price(symbol) {
            return Ok(quote);
        }

        let fetched = self
            .venue
            .latest_prices(std::slice::from_ref(&symbol.to_string()))
            .await?;
        let quote = fetched
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketError::Unavailable(symbol.to_string()))?;
        self.overlay.insert(symbol.to_string(), quote);
        Ok(quote)
    }

    /// Seed the published snapshot directly (scripted venues, tests).
    pub fn publish(&self, quotes: HashMap<String, PriceQuote>) {
        *self.snapshot.write() = Arc::new(quotes);
        self.overlay.clear();
    }
}

impl std::fmt::Debug for PriceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceCache")
            .field("ttl", &self.ttl)
            .field("snapshot_len", &self.snapshot.read().len())
            .finish_non_exhaustive()
    }
}
