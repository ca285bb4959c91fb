//! Order book types for market depth representation.
//!
//! This module provides types for representing order book state:
//!
//! - [`Level`] - A single price level with amount
//! - [`Orderbook`] - Complete order book for one venue, pair and asset class
//! - [`BookDelta`] - Absolute-amount updates at price levels
//!
//! # Order Book Structure
//!
//! An order book has two sides:
//! - **Bids**: Buy orders, sorted by price descending (best bid first)
//! - **Asks**: Sell orders, sorted by price ascending (best ask first)
//!
//! Deltas carry the new total amount at a price, so applying the same delta
//! twice yields the same book. An amount of zero deletes the level.
//!
//! # Examples
//!
//! ```
//! use tradeplex::domain::{AssetClass, BookDelta, Level, Orderbook, Pair};
//! use rust_decimal_macros::dec;
//!
//! let pair = Pair::new("BTC", "USD").unwrap();
//! let mut book = Orderbook::with_levels(
//!     "venue",
//!     pair,
//!     AssetClass::Spot,
//!     vec![Level::new(dec!(99), dec!(1))],
//!     vec![Level::new(dec!(100), dec!(1)), Level::new(dec!(101), dec!(2))],
//! );
//!
//! book.apply_delta(&BookDelta::asks(vec![Level::new(dec!(100), dec!(0))]));
//! assert_eq!(book.best_ask().unwrap().price, dec!(101));
//! ```

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::pair::Pair;
use crate::error::{Error, Result};

/// A single price level in an order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation_orders: Option<u64>,
}

impl Level {
    #[must_use]
    pub const fn new(price: Decimal, amount: Decimal) -> Self {
        Self {
            price,
            amount,
            order_count: None,
            liquidation_orders: None,
        }
    }

    #[must_use]
    pub const fn with_order_count(mut self, count: u64) -> Self {
        self.order_count = Some(count);
        self
    }
}

/// Side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    /// Ordering of two prices in this side's sort order.
    fn order(self, a: Decimal, b: Decimal) -> Ordering {
        match self {
            Self::Ask => a.cmp(&b),
            Self::Bid => b.cmp(&a),
        }
    }
}

/// An incremental update. Each level carries the new absolute amount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDelta {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
    /// Venue sequence number, when the venue supplies one.
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl BookDelta {
    #[must_use]
    pub fn new(bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self {
            bids,
            asks,
            sequence: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn asks(asks: Vec<Level>) -> Self {
        Self::new(Vec::new(), asks)
    }

    #[must_use]
    pub fn bids(bids: Vec<Level>) -> Self {
        Self::new(bids, Vec::new())
    }

    #[must_use]
    pub const fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// Order book for one (venue, pair, asset class).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orderbook {
    pub venue: String,
    pub pair: Pair,
    pub asset: AssetClass,
    /// Bid levels, sorted by price descending.
    bids: Vec<Level>,
    /// Ask levels, sorted by price ascending.
    asks: Vec<Level>,
    pub sequence: Option<u64>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Orderbook {
    /// Creates a new empty order book.
    #[must_use]
    pub fn new(venue: impl Into<String>, pair: Pair, asset: AssetClass) -> Self {
        Self {
            venue: venue.into(),
            pair,
            asset,
            bids: Vec::new(),
            asks: Vec::new(),
            sequence: None,
            last_updated: DateTime::<Utc>::default(),
        }
    }

    /// Creates a book with initial price levels, sorting each side.
    #[must_use]
    pub fn with_levels(
        venue: impl Into<String>,
        pair: Pair,
        asset: AssetClass,
        mut bids: Vec<Level>,
        mut asks: Vec<Level>,
    ) -> Self {
        bids.sort_by(|a, b| BookSide::Bid.order(a.price, b.price));
        asks.sort_by(|a, b| BookSide::Ask.order(a.price, b.price));
        Self {
            bids,
            asks,
            last_updated: Utc::now(),
            ..Self::new(venue, pair, asset)
        }
    }

    /// Returns all bid levels (sorted by price descending).
    #[must_use]
    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    /// Returns all ask levels (sorted by price ascending).
    #[must_use]
    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    /// Returns the best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    /// Returns the best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.best_ask()?.price + self.best_bid()?.price) / Decimal::TWO)
    }

    /// Number of (bid, ask) levels.
    #[must_use]
    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    #[must_use]
    pub fn total_bid_amount(&self) -> Decimal {
        self.bids.iter().map(|l| l.amount).sum()
    }

    #[must_use]
    pub fn total_ask_amount(&self) -> Decimal {
        self.asks.iter().map(|l| l.amount).sum()
    }

    /// True when the best ask is at or below the best bid.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.price <= bid.price,
            _ => false,
        }
    }

    /// Merge absolute-amount levels into one side.
    pub fn apply_levels(&mut self, side: BookSide, updates: &[Level]) {
        let levels = match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        };
        for update in updates {
            let found = levels.binary_search_by(|l| side.order(l.price, update.price));
            match (found, update.amount.is_zero()) {
                (Ok(i), true) => {
                    levels.remove(i);
                }
                (Ok(i), false) => levels[i] = update.clone(),
                (Err(_), true) => {}
                (Err(i), false) => levels.insert(i, update.clone()),
            }
        }
    }

    /// Apply a delta to both sides and advance the sequence.
    pub fn apply_delta(&mut self, delta: &BookDelta) {
        self.apply_levels(BookSide::Bid, &delta.bids);
        self.apply_levels(BookSide::Ask, &delta.asks);
        if delta.sequence.is_some() {
            self.sequence = delta.sequence;
        }
        self.last_updated = delta.timestamp;
    }

    /// Check ordering, amounts and the non-crossed invariant.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` describing the first violation.
    pub fn verify(&self) -> Result<()> {
        verify_side(&self.bids, BookSide::Bid).map_err(|e| self.violation(&e))?;
        verify_side(&self.asks, BookSide::Ask).map_err(|e| self.violation(&e))?;
        if self.is_crossed() {
            return Err(self.violation("best ask is at or below best bid"));
        }
        Ok(())
    }

    fn violation(&self, what: &str) -> Error {
        Error::InvalidInput(format!(
            "{} {} {} orderbook: {what}",
            self.venue, self.pair, self.asset
        ))
    }
}

fn verify_side(levels: &[Level], side: BookSide) -> std::result::Result<(), String> {
    for level in levels {
        if level.amount <= Decimal::ZERO {
            return Err(format!("{side:?} level {} has non-positive amount", level.price));
        }
    }
    for window in levels.windows(2) {
        if side.order(window[0].price, window[1].price) != Ordering::Less {
            return Err(format!(
                "{side:?} prices {} and {} are out of order",
                window[0].price, window[1].price
            ));
        }
    }
    Ok(())
}
