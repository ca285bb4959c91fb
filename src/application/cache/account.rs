//! Holdings per venue.

use dashmap::DashMap;

use crate::domain::Holdings;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct AccountCache {
    holdings: DashMap<String, Holdings>,
}

impl AccountCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the venue's holdings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange` when the venue name is empty.
    pub fn process(&self, holdings: Holdings) -> Result<()> {
        if holdings.venue.trim().is_empty() {
            return Err(Error::InvalidExchange("holdings venue is empty".into()));
        }
        self.holdings
            .insert(holdings.venue.to_ascii_lowercase(), holdings);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` when nothing is cached for the venue.
    pub fn get(&self, venue: &str) -> Result<Holdings> {
        self.holdings
            .get(&venue.to_ascii_lowercase())
            .map(|h| h.value().clone())
            .ok_or_else(|| Error::NotFound(format!("holdings for {venue}")))
    }

    pub fn remove(&self, venue: &str) -> Option<Holdings> {
        self.holdings
            .remove(&venue.to_ascii_lowercase())
            .map(|(_, h)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Balance, Currency, SubAccount};
    use rust_decimal_macros::dec;

    #[test]
    fn overwrite_and_available() {
        let cache = AccountCache::new();
        let main = SubAccount::new("main").with_balance("BTC", Balance::new(dec!(2), dec!(0.5)));
        cache.process(Holdings::new("Kraken", vec![main])).unwrap();

        let held = cache.get("kraken").unwrap();
        let btc = held.total(&Currency::new("btc"));
        assert_eq!(btc.available(), dec!(1.5));

        cache.process(Holdings::new("kraken", vec![])).unwrap();
        assert!(cache.get("KRAKEN").unwrap().accounts.is_empty());
    }

    #[test]
    fn empty_venue_rejected_and_miss_is_not_found() {
        let cache = AccountCache::new();
        assert!(cache.process(Holdings::new(" ", vec![])).is_err());
        assert!(matches!(cache.get("x"), Err(Error::NotFound(_))));
    }
}
