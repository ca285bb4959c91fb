//! Confirmed subscriptions, replayed in order after a reconnect.

use parking_lot::Mutex;

use crate::domain::Subscription;

#[derive(Debug, Default)]
pub struct SubscriptionLedger {
    entries: Mutex<Vec<Subscription>>,
}

impl SubscriptionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription. Returns false if it was already present.
    pub fn add(&self, subscription: Subscription) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains(&subscription) {
            return false;
        }
        entries.push(subscription);
        true
    }

    pub fn remove(&self, subscription: &Subscription) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|s| s != subscription);
        entries.len() != before
    }

    #[must_use]
    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.entries.lock().contains(subscription)
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{channel, AssetClass, Pair};

    #[test]
    fn add_is_idempotent_and_ordered() {
        let ledger = SubscriptionLedger::new();
        let ticker = |base| {
            let pair = Pair::new(base, "USD").unwrap();
            Subscription::for_pair(channel::TICKER, pair, AssetClass::Spot)
        };
        let btc = ticker("BTC");
        let eth = ticker("ETH");

        assert!(ledger.add(btc.clone()));
        assert!(ledger.add(eth.clone()));
        assert!(!ledger.add(btc.clone()));
        assert_eq!(ledger.snapshot(), vec![btc.clone(), eth.clone()]);

        assert!(ledger.remove(&btc));
        assert!(!ledger.remove(&btc));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&eth));
    }
}
