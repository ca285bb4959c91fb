//! Websocket defaults and reconnection policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Websocket reconnection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectionConfig {
    /// Initial delay before first reconnection attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum consecutive failures before circuit breaker trips.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Cooldown period after circuit breaker trips (milliseconds).
    #[serde(default = "default_circuit_breaker_cooldown_ms")]
    pub circuit_breaker_cooldown_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_circuit_breaker_cooldown_ms() -> u64 {
    300000 // 5 minutes
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_consecutive_failures: default_max_consecutive_failures(),
            circuit_breaker_cooldown_ms: default_circuit_breaker_cooldown_ms(),
        }
    }
}

/// Process-wide websocket defaults shared by every venue connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    #[serde(default)]
    pub reconnection: ReconnectionConfig,
    /// Capacity of the bounded data and diagnostic channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Consecutive undecodable frames tolerated before the link degrades.
    #[serde(default = "default_max_decode_failures")]
    pub max_decode_failures: u32,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

const fn default_channel_capacity() -> usize {
    10_000
}

const fn default_ping_interval_ms() -> u64 {
    15_000
}

const fn default_max_decode_failures() -> u32 {
    3
}

const fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl StreamConfig {
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnection: ReconnectionConfig::default(),
            channel_capacity: default_channel_capacity(),
            ping_interval_ms: default_ping_interval_ms(),
            max_decode_failures: default_max_decode_failures(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}
