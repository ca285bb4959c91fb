//! In-memory order ledger.
//!
//! Keyed by (venue, venue order id) with an internal id cross-reference.
//! All mutations go through a single mutex, so updates to one order are
//! serialized.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::domain::OrderDetail;

type LedgerKey = (String, String);

fn key(venue: &str, id: &str) -> LedgerKey {
    (venue.to_ascii_lowercase(), id.to_string())
}

#[derive(Debug, Default)]
struct Entries {
    orders: HashMap<LedgerKey, OrderDetail>,
    internal: HashMap<u64, LedgerKey>,
}

#[derive(Debug)]
pub struct OrderLedger {
    next_internal: AtomicU64,
    entries: Mutex<Entries>,
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_internal: AtomicU64::new(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Allocate an internal order id, unique within the process.
    pub fn next_internal_id(&self) -> u64 {
        self.next_internal.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert or merge an order. Orders first seen here get an internal id.
    /// Returns the stored record.
    pub fn upsert(&self, mut order: OrderDetail) -> OrderDetail {
        let k = key(&order.venue, &order.id);
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.orders.get_mut(&k) {
            existing.update_from(&order);
            return existing.clone();
        }
        let internal = match order.internal_id {
            Some(id) => id,
            None => self.next_internal_id(),
        };
        order.internal_id = Some(internal);
        order.normalise();
        entries.internal.insert(internal, k.clone());
        entries.orders.insert(k, order.clone());
        order
    }

    /// Move an order to the id a venue assigned on amendment, keeping its
    /// internal id. Returns the moved record.
    pub fn rekey(&self, venue: &str, old_id: &str, new_id: &str) -> Option<OrderDetail> {
        let mut entries = self.entries.lock();
        let mut order = entries.orders.remove(&key(venue, old_id))?;
        order.id = new_id.to_string();
        let k = key(venue, new_id);
        if let Some(internal) = order.internal_id {
            entries.internal.insert(internal, k.clone());
        }
        entries.orders.insert(k, order.clone());
        Some(order)
    }

    #[must_use]
    pub fn get(&self, venue: &str, id: &str) -> Option<OrderDetail> {
        self.entries.lock().orders.get(&key(venue, id)).cloned()
    }

    #[must_use]
    pub fn by_internal_id(&self, internal: u64) -> Option<OrderDetail> {
        let entries = self.entries.lock();
        let k = entries.internal.get(&internal)?;
        entries.orders.get(k).cloned()
    }

    /// Orders for one venue, oldest first.
    #[must_use]
    pub fn for_venue(&self, venue: &str) -> Vec<OrderDetail> {
        let venue = venue.to_ascii_lowercase();
        let mut orders: Vec<OrderDetail> = self
            .entries
            .lock()
            .orders
            .iter()
            .filter(|((v, _), _)| *v == venue)
            .map(|(_, o)| o.clone())
            .collect();
        orders.sort_by_key(|o| o.internal_id);
        orders
    }

    /// Orders not yet in a terminal status, across venues.
    #[must_use]
    pub fn active(&self) -> Vec<OrderDetail> {
        let mut orders: Vec<OrderDetail> = self
            .entries
            .lock()
            .orders
            .values()
            .filter(|o| !o.is_terminal())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.internal_id);
        orders
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::fixtures;
    use crate::domain::OrderStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn assigns_unique_internal_ids() {
        let ledger = OrderLedger::new();
        let a = ledger.upsert(fixtures::order("Kraken", "x1", OrderStatus::Active));
        let b = ledger.upsert(fixtures::order("kraken", "x2", OrderStatus::Active));
        assert_ne!(a.internal_id, b.internal_id);
        assert_eq!(ledger.by_internal_id(a.internal_id.unwrap()).unwrap().id, "x1");
        assert_eq!(ledger.for_venue("KRAKEN").len(), 2);
    }

    #[test]
    fn update_merges_into_existing() {
        let ledger = OrderLedger::new();
        let first = ledger.upsert(fixtures::order("v", "x1", OrderStatus::Active));

        let mut fill = fixtures::order("v", "x1", OrderStatus::Filled);
        fill.executed_amount = dec!(0);
        let merged = ledger.upsert(fill);

        assert_eq!(merged.internal_id, first.internal_id);
        assert_eq!(merged.status, OrderStatus::Filled);
        assert_eq!(merged.remaining_amount, dec!(0));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.active().is_empty());
    }

    #[test]
    fn rekey_keeps_internal_id() {
        let ledger = OrderLedger::new();
        let placed = ledger.upsert(fixtures::order("v", "old", OrderStatus::Active));

        let moved = ledger.rekey("v", "old", "new").unwrap();
        assert_eq!(moved.internal_id, placed.internal_id);
        assert!(ledger.get("v", "old").is_none());
        assert_eq!(ledger.by_internal_id(placed.internal_id.unwrap()).unwrap().id, "new");
        assert_eq!(ledger.len(), 1);
        assert!(ledger.rekey("v", "missing", "x").is_none());
    }
}
