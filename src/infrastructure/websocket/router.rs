//! Dispatches decoded stream events.
//!
//! Tickers, books, holdings and orders are written straight into the cache
//! and are never dropped. Trades and diagnostics fan out over broadcast
//! channels: a slow receiver loses the oldest items, not the newest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::frame::{truncate, MAX_QUOTED};
use crate::domain::{AssetClass, Pair, Trade};
use crate::port::{BookUpdate, MarketStore, StreamEvent};

/// Request to refetch a book whose stream state became unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncRequest {
    pub venue: String,
    pub pair: Pair,
    pub asset: AssetClass,
}

/// Something the core saw but did not act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub venue: String,
    pub message: String,
}

/// Per-connection counters.
#[derive(Debug, Default)]
pub struct StreamStats {
    pub messages: AtomicU64,
    pub events: AtomicU64,
    pub decode_failures: AtomicU64,
    pub reconnects: AtomicU64,
    pub resyncs_requested: AtomicU64,
    pub resyncs_dropped: AtomicU64,
    pub cache_rejections: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatsSnapshot {
    pub messages: u64,
    pub events: u64,
    pub decode_failures: u64,
    pub reconnects: u64,
    pub resyncs_requested: u64,
    pub resyncs_dropped: u64,
    pub cache_rejections: u64,
}

impl StreamStats {
    #[must_use]
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            resyncs_requested: self.resyncs_requested.load(Ordering::Relaxed),
            resyncs_dropped: self.resyncs_dropped.load(Ordering::Relaxed),
            cache_rejections: self.cache_rejections.load(Ordering::Relaxed),
        }
    }
}

pub struct Router {
    venue: String,
    store: Arc<dyn MarketStore>,
    trades: broadcast::Sender<Trade>,
    diagnostics: broadcast::Sender<Diagnostic>,
    resync: mpsc::Sender<ResyncRequest>,
    stats: Arc<StreamStats>,
}

impl Router {
    /// Returns the router and the receiving end of its resync channel.
    #[must_use]
    pub fn new(
        venue: impl Into<String>,
        store: Arc<dyn MarketStore>,
        capacity: usize,
        stats: Arc<StreamStats>,
    ) -> (Self, mpsc::Receiver<ResyncRequest>) {
        let capacity = capacity.max(1);
        let (trades, _) = broadcast::channel(capacity);
        let (diagnostics, _) = broadcast::channel(capacity);
        let (resync, resync_rx) = mpsc::channel(capacity);
        let router = Self {
            venue: venue.into(),
            store,
            trades,
            diagnostics,
            resync,
            stats,
        };
        (router, resync_rx)
    }

    pub fn trades(&self) -> broadcast::Receiver<Trade> {
        self.trades.subscribe()
    }

    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Route one event. Correlated responses are handled by the caller.
    pub fn route(&self, event: StreamEvent) {
        self.stats.events.fetch_add(1, Ordering::Relaxed);
        match event {
            StreamEvent::Ticker(ticker) => {
                if let Err(e) = self.store.put_ticker(ticker) {
                    self.reject("ticker", &e);
                }
            }
            StreamEvent::BookSnapshot(book) => {
                let (pair, asset) = (book.pair.clone(), book.asset);
                match self.store.apply_book_snapshot(book) {
                    Ok(BookUpdate::Degraded) => self.request_resync(pair, asset),
                    Ok(_) => {}
                    Err(e) => {
                        self.reject("book snapshot", &e);
                        self.request_resync(pair, asset);
                    }
                }
            }
            StreamEvent::BookDelta { pair, asset, delta } => {
                match self.store.apply_book_delta(&self.venue, &pair, asset, delta) {
                    Ok(BookUpdate::Degraded) => self.request_resync(pair, asset),
                    Ok(_) => {}
                    Err(e) => self.reject("book delta", &e),
                }
            }
            StreamEvent::Account(holdings) => {
                if let Err(e) = self.store.put_holdings(holdings) {
                    self.reject("holdings", &e);
                }
            }
            StreamEvent::Order(order) => self.store.upsert_order(order),
            StreamEvent::Trade(trade) => {
                // No receivers is fine; trades are best effort.
                let _ = self.trades.send(trade);
            }
            StreamEvent::Unhandled(message) => self.diagnose(message),
            StreamEvent::Heartbeat => {}
            StreamEvent::Response { id, method, .. } => {
                debug!(venue = %self.venue, ?id, ?method, "Response reached router");
            }
        }
    }

    /// Publish a diagnostic, cut to [`MAX_QUOTED`] bytes.
    pub fn diagnose(&self, message: impl Into<String>) {
        let mut message = message.into();
        let keep = truncate(&message, MAX_QUOTED).len();
        message.truncate(keep);
        let _ = self.diagnostics.send(Diagnostic {
            venue: self.venue.clone(),
            message,
        });
    }

    fn reject(&self, what: &str, error: &crate::error::Error) {
        self.stats.cache_rejections.fetch_add(1, Ordering::Relaxed);
        warn!(venue = %self.venue, error = %error, "Rejected streamed {what}");
        self.diagnose(format!("rejected {what}: {error}"));
    }

    fn request_resync(&self, pair: Pair, asset: AssetClass) {
        self.stats.resyncs_requested.fetch_add(1, Ordering::Relaxed);
        warn!(venue = %self.venue, pair = %pair, asset = %asset, "Orderbook degraded, requesting resync");
        let request = ResyncRequest {
            venue: self.venue.clone(),
            pair,
            asset,
        };
        if self.resync.try_send(request).is_err() {
            self.stats.resyncs_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Caches;
    use crate::domain::{BookDelta, Level, Orderbook, Ticker};
    use crate::infrastructure::config::OrderbookConfig;
    use rust_decimal_macros::dec;

    fn pair() -> Pair {
        Pair::new("BTC", "USD").unwrap()
    }

    fn router() -> (Router, mpsc::Receiver<ResyncRequest>, Arc<Caches>) {
        let caches = Arc::new(Caches::new(OrderbookConfig::default()));
        let (router, rx) = Router::new("v", caches.clone(), 4, Arc::default());
        (router, rx, caches)
    }

    #[test]
    fn ticker_goes_to_cache() {
        let (router, _rx, caches) = router();
        router.route(StreamEvent::Ticker(Ticker::new("v", pair(), AssetClass::Spot, dec!(10))));
        assert_eq!(caches.ticker("v", &pair(), AssetClass::Spot).unwrap().last, dec!(10));
    }

    #[test]
    fn delta_without_snapshot_requests_resync() {
        let (router, mut rx, _) = router();
        router.route(StreamEvent::BookDelta {
            pair: pair(),
            asset: AssetClass::Spot,
            delta: BookDelta::asks(vec![Level::new(dec!(1), dec!(1))]),
        });
        let req = rx.try_recv().unwrap();
        assert_eq!(req.pair, pair());
    }

    #[test]
    fn snapshot_then_delta_applies() {
        let (router, mut rx, caches) = router();
        router.route(StreamEvent::BookSnapshot(Orderbook::with_levels(
            "v",
            pair(),
            AssetClass::Spot,
            vec![Level::new(dec!(99), dec!(1))],
            vec![Level::new(dec!(100), dec!(1))],
        )));
        router.route(StreamEvent::BookDelta {
            pair: pair(),
            asset: AssetClass::Spot,
            delta: BookDelta::bids(vec![Level::new(dec!(98), dec!(2))]),
        });
        let book = caches.orderbook("v", &pair(), AssetClass::Spot).unwrap();
        assert_eq!(book.depth(), (2, 1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn trades_broadcast_drops_oldest() {
        let (router, _rx, _) = router();
        let mut trades = router.trades();
        for i in 0..6 {
            router.route(StreamEvent::Trade(Trade::new(
                i.to_string(),
                chrono::Utc::now(),
                dec!(1),
                dec!(1),
            )));
        }
        assert!(matches!(
            trades.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(trades.recv().await.unwrap().id, "2");
    }

    #[test]
    fn unhandled_payload_is_cut_to_quote_limit() {
        let (router, _rx, _) = router();
        let mut diagnostics = router.diagnostics();
        router.route(StreamEvent::Unhandled("x".repeat(10_000)));
        router.route(StreamEvent::Unhandled(format!("{}é", "y".repeat(MAX_QUOTED - 1))));

        let long = diagnostics.try_recv().unwrap();
        assert_eq!(long.message.len(), MAX_QUOTED);
        let multibyte = diagnostics.try_recv().unwrap();
        assert_eq!(multibyte.message, "y".repeat(MAX_QUOTED - 1));
    }
}
