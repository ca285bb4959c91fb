//! Request nonces.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Strictly increasing nonce seeded from the wall clock in milliseconds.
///
/// If the clock moves backwards the counter keeps counting up from the last
/// issued value.
#[derive(Debug, Default)]
pub struct Nonce {
    last: AtomicI64,
}

impl Nonce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a fixed value instead of the clock.
    #[must_use]
    pub fn starting_at(value: i64) -> Self {
        Self {
            last: AtomicI64::new(value),
        }
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }

    /// Last issued value, or the seed.
    pub fn peek(&self) -> i64 {
        self.last.load(Ordering::Acquire)
    }
}
