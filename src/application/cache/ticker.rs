//! Process-wide ticker cache.

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{AssetClass, MarketKey, Pair, Ticker};
use crate::error::{Error, Result};

/// Latest ticker per (venue, pair, asset class). Last writer wins.
#[derive(Debug, Default)]
pub struct TickerCache {
    tickers: DashMap<MarketKey, Ticker>,
}

impl TickerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a snapshot, replacing any previous one whole.
    /// A timestamp ahead of the local clock is clamped to now.
    ///
    /// # Errors
    ///
    /// Returns the validation error when identity fields are unset.
    pub fn process(&self, mut ticker: Ticker) -> Result<()> {
        let now = Utc::now();
        if ticker.last_updated > now {
            debug!(
                venue = %ticker.venue,
                pair = %ticker.pair,
                ahead_ms = (ticker.last_updated - now).num_milliseconds(),
                "Ticker timestamp ahead of local clock, clamping"
            );
            ticker.last_updated = now;
        }
        ticker.validate()?;
        let key = MarketKey::new(&ticker.venue, &ticker.pair, ticker.asset);
        self.tickers.insert(key, ticker);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` when nothing is cached for the key.
    pub fn get(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Result<Ticker> {
        let key = MarketKey::new(venue, pair, asset);
        self.tickers
            .get(&key)
            .map(|t| t.value().clone())
            .ok_or_else(|| Error::NotFound(format!("ticker {key}")))
    }

    /// Every cached ticker for one venue.
    #[must_use]
    pub fn for_venue(&self, venue: &str) -> Vec<Ticker> {
        let venue = venue.to_ascii_lowercase();
        self.tickers
            .iter()
            .filter(|e| e.key().venue() == venue)
            .map(|e| e.value().clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn btc() -> Pair {
        Pair::new("BTC", "USD").unwrap()
    }

    #[test]
    fn last_writer_wins() {
        let cache = TickerCache::new();
        cache.process(Ticker::new("Kraken", btc(), AssetClass::Spot, dec!(1))).unwrap();
        cache.process(Ticker::new("kraken", btc(), AssetClass::Spot, dec!(2))).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("KRAKEN", &btc(), AssetClass::Spot).unwrap().last, dec!(2));
    }

    #[test]
    fn miss_is_not_found() {
        let cache = TickerCache::new();
        let err = cache.get("kraken", &btc(), AssetClass::Spot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn rejects_incomplete_snapshots() {
        let cache = TickerCache::new();
        assert!(cache.process(Ticker::new("", btc(), AssetClass::Spot, dec!(1))).is_err());
        assert!(cache
            .process(Ticker::new("v", Pair::default(), AssetClass::Spot, dec!(1)))
            .is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn clock_skewed_snapshot_is_clamped_to_now() {
        let cache = TickerCache::new();
        let mut skewed = Ticker::new("v", btc(), AssetClass::Spot, dec!(1));
        skewed.last_updated = Utc::now() + Duration::seconds(2);
        cache.process(skewed).unwrap();

        let stored = cache.get("v", &btc(), AssetClass::Spot).unwrap();
        assert!(stored.last_updated <= Utc::now());
        assert!(stored.last_updated > Utc::now() - Duration::minutes(1));
    }

    #[test]
    fn classes_are_separate_keys() {
        let cache = TickerCache::new();
        cache.process(Ticker::new("v", btc(), AssetClass::Spot, dec!(1))).unwrap();
        cache.process(Ticker::new("v", btc(), AssetClass::Futures, dec!(2))).unwrap();
        assert_eq!(cache.for_venue("V").len(), 2);
    }
}
