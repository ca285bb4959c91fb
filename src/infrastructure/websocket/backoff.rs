//! Reconnection backoff with a circuit breaker.
//!
//! Delays grow exponentially with up to 20% random jitter. After
//! `max_consecutive_failures` the breaker opens and attempts pause for the
//! cooldown, after which the backoff starts over.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{error, info};

use crate::infrastructure::config::ReconnectionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { until: Instant },
}

/// Tracks consecutive failures and computes the wait before the next attempt.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectionConfig,
    consecutive_failures: u32,
    current_delay_ms: u64,
    circuit: CircuitState,
}

impl Backoff {
    #[must_use]
    pub fn new(config: ReconnectionConfig) -> Self {
        let initial = config.initial_delay_ms;
        Self {
            config,
            consecutive_failures: 0,
            current_delay_ms: initial,
            circuit: CircuitState::Closed,
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.circuit, CircuitState::Open { until } if Instant::now() < until)
    }

    /// Forget failures after a successful connection.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay_ms = self.config.initial_delay_ms;
        self.circuit = CircuitState::Closed;
    }

    /// Count a failed attempt, opening the breaker at the threshold.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.max_consecutive_failures {
            let cooldown = Duration::from_millis(self.config.circuit_breaker_cooldown_ms);
            self.circuit = CircuitState::Open {
                until: Instant::now() + cooldown,
            };
            error!(
                failures = self.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Circuit breaker tripped, pausing reconnection attempts"
            );
        }
    }

    /// Wait before the next attempt: any remaining cooldown plus the
    /// jittered backoff delay. Advances the delay for the following call.
    pub fn next_delay(&mut self) -> Duration {
        let mut wait = Duration::ZERO;
        if let CircuitState::Open { until } = self.circuit {
            wait = until.saturating_duration_since(Instant::now());
            info!(remaining_ms = wait.as_millis() as u64, "Circuit breaker cooldown");
            self.reset();
        }

        let base = Duration::from_millis(self.current_delay_ms);
        let jitter = Duration::from_millis(jitter_ms(self.current_delay_ms));

        let next = (self.current_delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay_ms = next.min(self.config.max_delay_ms);

        wait + base + jitter
    }
}

fn jitter_ms(base_ms: u64) -> u64 {
    let range = base_ms / 5;
    if range == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectionConfig {
        ReconnectionConfig {
            initial_delay_ms: 100,
            max_delay_ms: 400,
            backoff_multiplier: 2.0,
            max_consecutive_failures: 3,
            circuit_breaker_cooldown_ms: 50,
        }
    }

    fn within(delay: Duration, base_ms: u64) -> bool {
        let ms = delay.as_millis() as u64;
        ms >= base_ms && ms <= base_ms + base_ms / 5
    }

    #[test]
    fn delay_grows_and_caps() {
        let mut backoff = Backoff::new(config());
        assert!(within(backoff.next_delay(), 100));
        assert!(within(backoff.next_delay(), 200));
        assert!(within(backoff.next_delay(), 400));
        assert!(within(backoff.next_delay(), 400));
    }

    #[test]
    fn reset_restarts_from_initial() {
        let mut backoff = Backoff::new(config());
        backoff.next_delay();
        backoff.next_delay();
        backoff.record_failure();
        backoff.reset();
        assert_eq!(backoff.consecutive_failures(), 0);
        assert!(within(backoff.next_delay(), 100));
    }

    #[test]
    fn breaker_opens_at_threshold() {
        let mut backoff = Backoff::new(config());
        backoff.record_failure();
        backoff.record_failure();
        assert!(!backoff.is_open());
        backoff.record_failure();
        assert!(backoff.is_open());

        // Cooldown is folded into the next wait and the breaker closes.
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(100));
        assert!(!backoff.is_open());
        assert_eq!(backoff.consecutive_failures(), 0);
    }
}
