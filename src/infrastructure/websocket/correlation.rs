//! Pairs websocket responses with the requests that caused them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default cap on requests awaiting a response.
pub const DEFAULT_MAX_OUTSTANDING: usize = 256;

type Reply = oneshot::Sender<Result<Value>>;

struct Waiter {
    method: String,
    deadline: Instant,
    reply: Reply,
}

#[derive(Default)]
struct Pending {
    by_id: HashMap<i64, Waiter>,
    /// Ids per method in send order, for venues that only echo the method.
    by_method: HashMap<String, VecDeque<i64>>,
}

impl Pending {
    fn take(&mut self, id: i64) -> Option<Waiter> {
        let waiter = self.by_id.remove(&id)?;
        if let Some(queue) = self.by_method.get_mut(&waiter.method) {
            queue.retain(|q| *q != id);
            if queue.is_empty() {
                self.by_method.remove(&waiter.method);
            }
        }
        Some(waiter)
    }
}

/// Message id allocator and table of requests awaiting a reply.
pub struct Correlator {
    venue: String,
    next_id: AtomicI64,
    max_outstanding: usize,
    pending: Mutex<Pending>,
}

impl Correlator {
    #[must_use]
    pub fn new(venue: impl Into<String>, max_outstanding: usize) -> Self {
        Self {
            venue: venue.into(),
            next_id: AtomicI64::new(1),
            max_outstanding,
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Allocate a message id. Ids are unique per connection manager.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Start waiting for the reply to request `id`.
    ///
    /// # Errors
    ///
    /// Returns `WsProtocol` when the outstanding limit is reached.
    pub fn register(
        &self,
        id: i64,
        method: &str,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Result<Value>>> {
        let mut pending = self.pending.lock();
        if pending.by_id.len() >= self.max_outstanding {
            return Err(Error::WsProtocol(format!(
                "{}: {} requests already awaiting a response",
                self.venue, self.max_outstanding
            )));
        }
        let (tx, rx) = oneshot::channel();
        pending.by_id.insert(
            id,
            Waiter {
                method: method.to_string(),
                deadline,
                reply: tx,
            },
        );
        pending
            .by_method
            .entry(method.to_string())
            .or_default()
            .push_back(id);
        Ok(rx)
    }

    /// Deliver a reply. Matches by id when given, otherwise the oldest
    /// request for `method`. Returns false for unsolicited replies.
    pub fn resolve(&self, id: Option<i64>, method: Option<&str>, result: Result<Value>) -> bool {
        let waiter = {
            let mut pending = self.pending.lock();
            let target = match (id, method) {
                (Some(id), _) => Some(id),
                (None, Some(method)) => pending
                    .by_method
                    .get(method)
                    .and_then(|queue| queue.front().copied()),
                (None, None) => None,
            };
            target.and_then(|id| pending.take(id))
        };
        match waiter {
            Some(waiter) => {
                // The requester may have given up already.
                let _ = waiter.reply.send(result);
                true
            }
            None => {
                debug!(venue = %self.venue, ?id, ?method, "Unsolicited response");
                false
            }
        }
    }

    /// Stop waiting for `id` without a reply.
    pub fn cancel(&self, id: i64) {
        self.pending.lock().take(id);
    }

    /// Fail every request whose deadline has passed with `WsTimeout`.
    pub fn expire(&self, now: Instant) -> usize {
        let expired: Vec<(i64, Waiter)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<i64> = pending
                .by_id
                .iter()
                .filter(|(_, w)| w.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.take(id).map(|w| (id, w)))
                .collect()
        };
        let count = expired.len();
        for (id, waiter) in expired {
            warn!(venue = %self.venue, id, method = %waiter.method, "Websocket request timed out");
            let _ = waiter.reply.send(Err(Error::WsTimeout {
                request: format!("{}#{id}", waiter.method),
            }));
        }
        count
    }

    /// Fail every outstanding request with `WsClosed`.
    pub fn drain(&self) -> usize {
        let drained: Vec<Waiter> = {
            let mut pending = self.pending.lock();
            pending.by_method.clear();
            pending.by_id.drain().map(|(_, w)| w).collect()
        };
        let count = drained.len();
        for waiter in drained {
            let _ = waiter.reply.send(Err(Error::WsClosed));
        }
        count
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending.lock().by_id.len()
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("venue", &self.venue)
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn resolves_by_id() {
        let c = Correlator::new("v", 8);
        let id = c.next_id();
        let rx = c.register(id, "subscribe", later()).unwrap();
        assert!(c.resolve(Some(id), None, Ok(Value::Bool(true))));
        assert_eq!(rx.await.unwrap().unwrap(), Value::Bool(true));
        assert_eq!(c.outstanding(), 0);
    }

    #[tokio::test]
    async fn resolves_by_method_in_send_order() {
        let c = Correlator::new("v", 8);
        let first = c.register(c.next_id(), "sub", later()).unwrap();
        let second = c.register(c.next_id(), "sub", later()).unwrap();

        assert!(c.resolve(None, Some("sub"), Ok(Value::from(1))));
        assert!(c.resolve(None, Some("sub"), Ok(Value::from(2))));
        assert!(!c.resolve(None, Some("sub"), Ok(Value::from(3))));

        assert_eq!(first.await.unwrap().unwrap(), Value::from(1));
        assert_eq!(second.await.unwrap().unwrap(), Value::from(2));
    }

    #[tokio::test]
    async fn expired_requests_time_out() {
        let c = Correlator::new("v", 8);
        let id = c.next_id();
        let rx = c.register(id, "auth", Instant::now()).unwrap();
        assert_eq!(c.expire(Instant::now() + Duration::from_millis(1)), 1);
        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::WsTimeout { .. }));
        // A late reply is ignored.
        assert!(!c.resolve(Some(id), None, Ok(Value::Null)));
    }

    #[tokio::test]
    async fn drain_closes_waiters() {
        let c = Correlator::new("v", 8);
        let rx = c.register(c.next_id(), "sub", later()).unwrap();
        assert_eq!(c.drain(), 1);
        assert!(matches!(rx.await.unwrap(), Err(Error::WsClosed)));
    }

    #[test]
    fn outstanding_limit() {
        let c = Correlator::new("v", 1);
        let _rx = c.register(c.next_id(), "sub", later()).unwrap();
        assert!(c.register(c.next_id(), "sub", later()).is_err());
    }
}
