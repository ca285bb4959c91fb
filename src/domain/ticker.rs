//! Latest aggregate market statistics for one venue, pair and asset class.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::pair::Pair;
use crate::error::{Error, Result};

/// Price snapshot.
///
/// `last_updated` defaults to the Unix epoch, meaning "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub venue: String,
    pub pair: Pair,
    pub asset: AssetClass,
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Ticker {
    /// A ticker with only identity and last price set.
    #[must_use]
    pub fn new(venue: impl Into<String>, pair: Pair, asset: AssetClass, last: Decimal) -> Self {
        Self {
            venue: venue.into(),
            pair,
            asset,
            last,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            open: Decimal::ZERO,
            close: Decimal::ZERO,
            volume: Decimal::ZERO,
            quote_volume: Decimal::ZERO,
            last_updated: DateTime::<Utc>::default(),
        }
    }

    /// Check identity fields and that the timestamp is not in the future.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchange`, `InvalidPair` or `InvalidInput` for the
    /// first field that is unset or out of range.
    pub fn validate(&self) -> Result<()> {
        if self.venue.trim().is_empty() {
            return Err(Error::InvalidExchange("ticker venue is empty".into()));
        }
        if self.pair.base.is_empty() || self.pair.quote.is_empty() {
            return Err(Error::InvalidPair(format!(
                "{}: ticker pair is empty",
                self.venue
            )));
        }
        if self.last_updated > Utc::now() {
            return Err(Error::InvalidInput(format!(
                "{} {}: ticker timestamp {} is in the future",
                self.venue, self.pair, self.last_updated
            )));
        }
        Ok(())
    }
}
