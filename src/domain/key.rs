//! Cache key shared by the ticker and orderbook stores.

use std::fmt;

use super::asset::AssetClass;
use super::pair::{Currency, Pair};

/// (venue, base, quote, asset class). Venue names are compared lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketKey {
    venue: String,
    base: Currency,
    quote: Currency,
    asset: AssetClass,
}

impl MarketKey {
    #[must_use]
    pub fn new(venue: &str, pair: &Pair, asset: AssetClass) -> Self {
        Self {
            venue: venue.to_ascii_lowercase(),
            base: pair.base.clone(),
            quote: pair.quote.clone(),
            asset,
        }
    }

    #[must_use]
    pub fn venue(&self) -> &str {
        &self.venue
    }

    #[must_use]
    pub fn asset(&self) -> AssetClass {
        self.asset
    }

    #[must_use]
    pub fn base(&self) -> &Currency {
        &self.base
    }

    #[must_use]
    pub fn quote(&self) -> &Currency {
        &self.quote
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}:{}", self.venue, self.base, self.quote, self.asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_venue_case_and_pair_format() {
        let a = MarketKey::new("Kraken", &Pair::new("btc", "usd").unwrap(), AssetClass::Spot);
        let b = MarketKey::new(
            "kraken",
            &Pair::with_delimiter("BTC", "USD", "/").unwrap(),
            AssetClass::Spot,
        );
        assert_eq!(a, b);
        assert_ne!(
            a,
            MarketKey::new("kraken", &Pair::new("BTC", "USD").unwrap(), AssetClass::Futures)
        );
    }
}
