//! Cache facade handed to venues and the stream router.
//!
//! Venues never hold the caches themselves; they write through this port,
//! which keeps the cache layer free of references back to venues.

use crate::domain::{
    AssetClass, BookDelta, Holdings, OrderDetail, Orderbook, Pair, Ticker,
};
use crate::error::Result;

/// Result of handing a streamed book update to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookUpdate {
    /// The book now reflects the update.
    Applied,
    /// Held until a snapshot or the next flush.
    Buffered,
    /// The book is unusable until a fresh snapshot arrives.
    Degraded,
}

pub trait MarketStore: Send + Sync {
    /// # Errors
    ///
    /// Returns a validation error for incomplete snapshots.
    fn put_ticker(&self, ticker: Ticker) -> Result<()>;

    /// # Errors
    ///
    /// Returns `NotFound` on a cache miss.
    fn ticker(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Result<Ticker>;

    /// Replace a book from a REST fetch.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the book is malformed.
    fn put_orderbook(&self, book: Orderbook) -> Result<()>;

    /// # Errors
    ///
    /// Returns `NotFound` on a cache miss.
    fn orderbook(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Result<Orderbook>;

    /// Streamed snapshot: replaces the book and discards stale deltas.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the snapshot is malformed.
    fn apply_book_snapshot(&self, book: Orderbook) -> Result<BookUpdate>;

    /// Streamed delta: buffered, then applied in order. A delta for a book
    /// with no snapshot reports `Degraded` so a resync is requested.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot accept the delta.
    fn apply_book_delta(
        &self,
        venue: &str,
        pair: &Pair,
        asset: AssetClass,
        delta: BookDelta,
    ) -> Result<BookUpdate>;

    /// # Errors
    ///
    /// Returns `InvalidExchange` when the venue name is empty.
    fn put_holdings(&self, holdings: Holdings) -> Result<()>;

    /// # Errors
    ///
    /// Returns `NotFound` on a cache miss.
    fn holdings(&self, venue: &str) -> Result<Holdings>;

    /// Merge an order update into the ledger entry for (venue, id).
    fn upsert_order(&self, order: OrderDetail);
}
