//! Public trade prints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::order::Side;
use super::pair::Pair;

/// A single executed trade reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub venue: String,
    pub pair: Pair,
    pub asset: AssetClass,
    pub id: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        Self {
            venue: String::new(),
            pair: Pair::default(),
            asset: AssetClass::Spot,
            id: id.into(),
            price,
            amount,
            side: Side::Unknown,
            timestamp,
        }
    }
}
