//! Orderbook snapshots plus the streaming update buffer.
//!
//! Each (venue, pair, asset class) has a stored book and a FIFO of pending
//! deltas. Snapshots replace the book and discard deltas that pre-date them.
//! Deltas are buffered and drained in arrival order, or in sequence order
//! when the venue's `sortBuffer` flag is set. Reads apply deltas that have
//! waited longer than the publish period. A book that crosses after a drain,
//! or whose buffer overflows behind a strict sequence gap, is marked degraded
//! until a fresh snapshot arrives.

use std::collections::VecDeque;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::{AssetClass, BookDelta, MarketKey, Orderbook, Pair};
use crate::error::{Error, Result};
use crate::infrastructure::config::OrderbookConfig;
use crate::port::BookUpdate;

/// Usability of a cached book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookHealth {
    Healthy,
    /// Unusable; a snapshot has been requested and deltas are held.
    AwaitingSnapshot,
}

#[derive(Debug)]
struct BookEntry {
    book: Option<Orderbook>,
    pending: VecDeque<BookDelta>,
    health: BookHealth,
    /// Set once `Degraded` has been reported for the current outage.
    resync_requested: bool,
    last_flush: Instant,
    dropped: u64,
}

impl BookEntry {
    fn awaiting() -> Self {
        Self {
            book: None,
            pending: VecDeque::new(),
            health: BookHealth::AwaitingSnapshot,
            resync_requested: false,
            last_flush: Instant::now(),
            dropped: 0,
        }
    }

    /// Install a snapshot and drop the deltas it supersedes.
    fn replace(&mut self, book: Orderbook) {
        let pending_before = self.pending.len();
        match book.sequence {
            Some(seq) => self.pending.retain(|d| d.sequence.is_some_and(|s| s > seq)),
            None => self.pending.clear(),
        }
        let discarded = pending_before - self.pending.len();
        if discarded > 0 {
            debug!(
                venue = %book.venue,
                pair = %book.pair,
                discarded,
                "Discarded deltas superseded by snapshot"
            );
        }
        self.book = Some(book);
        self.health = BookHealth::Healthy;
        self.resync_requested = false;
    }

    /// Apply pending deltas. Returns the number applied.
    ///
    /// Deltas at or below the book's sequence are discarded. With
    /// `strict_sequence`, a delta that leaves a gap is held until the gap
    /// fills.
    fn drain(&mut self, config: &OrderbookConfig) -> usize {
        let Some(book) = self.book.as_mut() else {
            return 0;
        };
        if config.sort_buffer {
            self.pending
                .make_contiguous()
                .sort_by_key(|d| d.sequence.unwrap_or(u64::MAX));
        }
        let mut applied = 0;
        while let Some(delta) = self.pending.front() {
            match (book.sequence, delta.sequence) {
                (Some(current), Some(next)) if next <= current => {
                    self.pending.pop_front();
                }
                (Some(current), Some(next)) if config.strict_sequence && next > current + 1 => {
                    break
                }
                _ => {
                    if let Some(delta) = self.pending.pop_front() {
                        book.apply_delta(&delta);
                        applied += 1;
                    }
                }
            }
        }
        self.last_flush = Instant::now();
        applied
    }

    /// Drop the oldest pending deltas beyond `cap`. Returns how many went.
    fn trim(&mut self, cap: usize) -> usize {
        let excess = self.pending.len().saturating_sub(cap);
        drop(self.pending.drain(..excess));
        self.dropped += excess as u64;
        excess
    }

    fn stale(&self, config: &OrderbookConfig) -> bool {
        !self.pending.is_empty() && self.last_flush.elapsed() >= config.publish_period
    }
}

/// Snapshot store and update buffer for every streamed book.
#[derive(Debug, Default)]
pub struct BookCache {
    books: DashMap<MarketKey, BookEntry>,
    configs: DashMap<String, OrderbookConfig>,
    default_config: OrderbookConfig,
}

impl BookCache {
    #[must_use]
    pub fn new(default_config: OrderbookConfig) -> Self {
        Self {
            books: DashMap::new(),
            configs: DashMap::new(),
            default_config,
        }
    }

    /// Buffer settings for one venue's books.
    pub fn configure(&self, venue: &str, config: OrderbookConfig) {
        self.configs.insert(venue.to_ascii_lowercase(), config);
    }

    fn config(&self, venue: &str) -> OrderbookConfig {
        self.configs
            .get(&venue.to_ascii_lowercase())
            .map_or_else(|| self.default_config.clone(), |c| c.value().clone())
    }

    /// Replace a book from a snapshot, REST or streamed, then apply any
    /// buffered deltas newer than it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the snapshot fails verification, unless the
    /// venue bypasses verification.
    pub fn replace(&self, book: Orderbook) -> Result<BookUpdate> {
        if book.venue.trim().is_empty() {
            return Err(Error::InvalidExchange("orderbook venue is empty".into()));
        }
        let config = self.config(&book.venue);
        if !config.verification_bypass {
            book.verify()?;
        }
        let key = MarketKey::new(&book.venue, &book.pair, book.asset);
        let mut entry = self.books.entry(key.clone()).or_insert_with(BookEntry::awaiting);
        entry.replace(book);
        entry.drain(&config);
        Ok(Self::check(&key, &mut entry, &config))
    }

    /// Queue a streamed delta and drain when due.
    ///
    /// A delta for a book awaiting a snapshot reports `Degraded` once per
    /// outage, so exactly one resync is requested.
    pub fn apply_delta(
        &self,
        venue: &str,
        pair: &Pair,
        asset: AssetClass,
        delta: BookDelta,
    ) -> BookUpdate {
        let config = self.config(venue);
        let key = MarketKey::new(venue, pair, asset);
        let mut entry = self.books.entry(key.clone()).or_insert_with(BookEntry::awaiting);

        if entry.health == BookHealth::AwaitingSnapshot {
            entry.pending.push_back(delta);
            let dropped = entry.trim(config.snapshot_wait_limit.max(1));
            if dropped > 0 {
                warn!(
                    key = %key,
                    dropped,
                    total_dropped = entry.dropped,
                    "Orderbook deltas dropped while awaiting snapshot"
                );
            }
            if entry.resync_requested {
                return BookUpdate::Buffered;
            }
            entry.resync_requested = true;
            return BookUpdate::Degraded;
        }

        entry.pending.push_back(delta);
        let limit = config.websocket_buffer_limit.max(1);
        let due = !config.websocket_buffer_enabled
            || entry.pending.len() >= limit
            || entry.last_flush.elapsed() >= config.publish_period;
        if !due {
            return BookUpdate::Buffered;
        }

        let applied = entry.drain(&config);
        if entry.pending.len() >= limit {
            // Held behind a sequence gap with no snapshot pending.
            let dropped = entry.trim(limit - 1);
            warn!(key = %key, dropped, "Orderbook buffer overflowed behind a sequence gap");
            entry.health = BookHealth::AwaitingSnapshot;
            entry.resync_requested = true;
            return BookUpdate::Degraded;
        }
        match Self::check(&key, &mut entry, &config) {
            BookUpdate::Applied if applied == 0 => BookUpdate::Buffered,
            other => other,
        }
    }

    /// Re-assert the non-crossed invariant after a drain.
    fn check(key: &MarketKey, entry: &mut BookEntry, config: &OrderbookConfig) -> BookUpdate {
        let crossed = entry.book.as_ref().is_some_and(Orderbook::is_crossed);
        if crossed && !config.verification_bypass {
            warn!(key = %key, "Orderbook crossed after update, awaiting snapshot");
            entry.health = BookHealth::AwaitingSnapshot;
            entry.resync_requested = true;
            return BookUpdate::Degraded;
        }
        BookUpdate::Applied
    }

    /// Apply everything buffered regardless of the flush schedule.
    /// Reports `Buffered` when nothing was applied.
    pub fn flush(&self, venue: &str, pair: &Pair, asset: AssetClass) -> BookUpdate {
        let config = self.config(venue);
        let key = MarketKey::new(venue, pair, asset);
        match self.books.get_mut(&key) {
            Some(mut entry) if entry.health == BookHealth::Healthy => {
                let applied = entry.drain(&config);
                match Self::check(&key, &mut entry, &config) {
                    BookUpdate::Applied if applied == 0 => BookUpdate::Buffered,
                    other => other,
                }
            }
            Some(_) => BookUpdate::Degraded,
            None => BookUpdate::Buffered,
        }
    }

    /// The current book. Deltas buffered for longer than the venue's publish
    /// period are applied first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no usable book is cached.
    pub fn get(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Result<Orderbook> {
        let key = MarketKey::new(venue, pair, asset);
        let not_found = || Error::NotFound(format!("orderbook {key}"));
        let mut entry = self.books.get_mut(&key).ok_or_else(not_found)?;
        if entry.health == BookHealth::Healthy {
            let config = self.config(venue);
            if entry.stale(&config) {
                entry.drain(&config);
                if Self::check(&key, &mut entry, &config) == BookUpdate::Degraded {
                    // Nobody saw the degrade yet; let the next delta request the resync.
                    entry.resync_requested = false;
                }
            }
        }
        if entry.health != BookHealth::Healthy {
            return Err(not_found());
        }
        entry.book.clone().ok_or_else(not_found)
    }

    #[must_use]
    pub fn health(&self, venue: &str, pair: &Pair, asset: AssetClass) -> Option<BookHealth> {
        self.books
            .get(&MarketKey::new(venue, pair, asset))
            .map(|e| e.health)
    }

    #[must_use]
    pub fn pending(&self, venue: &str, pair: &Pair, asset: AssetClass) -> usize {
        self.books
            .get(&MarketKey::new(venue, pair, asset))
            .map_or(0, |e| e.pending.len())
    }

    /// Deltas discarded on overflow for one book since it was first seen.
    #[must_use]
    pub fn dropped(&self, venue: &str, pair: &Pair, asset: AssetClass) -> u64 {
        self.books
            .get(&MarketKey::new(venue, pair, asset))
            .map_or(0, |e| e.dropped)
    }
}
