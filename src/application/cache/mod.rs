//! Process-wide market data caches and the order ledger.
//!
//! - [`ticker::TickerCache`]: latest ticker per (venue, pair, asset class)
//! - [`book::BookCache`]: orderbook snapshots plus the streaming update buffer
//! - [`account::AccountCache`]: holdings per venue
//! - [`orders::OrderLedger`]: orders keyed by (venue, venue order id)
//!
//! [`Caches`] bundles them and is the [`MarketStore`] venues write through.

pub mod account;
pub mod book;
pub mod orders;
pub mod ticker;

use std::sync::Arc;

use crate::domain::{AssetClass, BookDelta, Holdings, OrderDetail, Orderbook, Pair, Ticker};
use crate::error::Result;
use crate::infrastructure::config::OrderbookConfig;
use crate::port::{BookUpdate, MarketStore};

pub use account::AccountCache;
pub use book::{BookCache, BookHealth};
pub use orders::OrderLedger;
pub use ticker::TickerCache;

#[derive(Debug, Default)]
pub struct Caches {
    pub tickers: TickerCache,
    pub books: BookCache,
    pub accounts: AccountCache,
    /// Shared with the order manager.
    pub orders: Arc<OrderLedger>,
}

impl Caches {
    #[must_use]
    pub fn new(orderbook: OrderbookConfig) -> Self {
        Self {
            tickers: TickerCache::new(),
            books: BookCache::new(orderbook),
            accounts: AccountCache::new(),
            orders: Arc::new(OrderLedger::new()),
        }
    }

    /// Per-venue orderbook buffering, overriding the default.
    pub fn configure_venue(&self, venue: &str, orderbook: OrderbookConfig) {
        self.books.configure(venue, orderbook);
    }
}

impl MarketStore for Caches {
    fn put_ticker(&self, ticker: Ticker) -> Result<()> {
        self.tickers.process(ticker)
    }

    fn ticker(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Result<Ticker> {
        self.tickers.get(venue, pair, asset)
    }

    fn put_orderbook(&self, book: Orderbook) -> Result<()> {
        self.books.replace(book).map(|_| ())
    }

    fn orderbook(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Result<Orderbook> {
        self.books.get(venue, pair, asset)
    }

    fn apply_book_snapshot(&self, book: Orderbook) -> Result<BookUpdate> {
        self.books.replace(book)
    }

    fn apply_book_delta(
        &self,
        venue: &str,
        pair: &Pair,
        asset: AssetClass,
        delta: BookDelta,
    ) -> Result<BookUpdate> {
        Ok(self.books.apply_delta(venue, pair, asset, delta))
    }

    fn put_holdings(&self, holdings: Holdings) -> Result<()> {
        self.accounts.process(holdings)
    }

    fn holdings(&self, venue: &str) -> Result<Holdings> {
        self.accounts.get(venue)
    }

    fn upsert_order(&self, order: OrderDetail) {
        self.orders.upsert(order);
    }
}
