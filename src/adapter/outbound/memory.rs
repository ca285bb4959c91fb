//! In-memory [`WithdrawStore`].

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::WithdrawEvent;
use crate::error::{Error, Result};
use crate::port::WithdrawStore;

/// Keeps withdrawal events for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryWithdrawStore {
    events: RwLock<Vec<WithdrawEvent>>,
    fail_saves: AtomicBool,
}

impl MemoryWithdrawStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail, for exercising error paths.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WithdrawStore for MemoryWithdrawStore {
    async fn save(&self, event: &WithdrawEvent) -> Result<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(Error::Connection("withdraw store unavailable".into()));
        }
        let mut events = self.events.write();
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawEvent>> {
        Ok(self.events.read().iter().find(|e| e.id == id).cloned())
    }

    async fn list_for_venue(&self, venue: &str, limit: usize) -> Result<Vec<WithdrawEvent>> {
        let mut events: Vec<WithdrawEvent> = self
            .events
            .read()
            .iter()
            .filter(|e| e.venue.eq_ignore_ascii_case(venue))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created.cmp(&a.created));
        events.truncate(limit);
        Ok(events)
    }
}
