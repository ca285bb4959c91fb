//! Token-bucket rate limiting per venue and endpoint class.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use tracing::trace;

use super::config::{BucketConfig, RateLimiterConfig};
use crate::error::{ConfigError, Result};

type Bucket = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Endpoint class used when a request names none.
pub const DEFAULT_CLASS: &str = "default";

/// One venue's limiter. Every outbound request acquires from the bucket of
/// its endpoint class before dispatch.
pub struct RateLimiter {
    enabled: bool,
    default_bucket: Bucket,
    classes: HashMap<String, Bucket>,
}

fn bucket(config: &BucketConfig) -> Result<Bucket> {
    let burst = NonZeroU32::new(config.burst).ok_or(ConfigError::InvalidValue {
        field: "burst",
        reason: "must be greater than 0".to_string(),
    })?;
    let quota = Quota::with_period(Duration::from_millis(config.interval_ms))
        .ok_or(ConfigError::InvalidValue {
            field: "intervalMs",
            reason: "must be greater than 0".to_string(),
        })?
        .allow_burst(burst);
    Ok(GovernorRateLimiter::direct(quota))
}

impl RateLimiter {
    /// # Errors
    ///
    /// Returns a config error for a zero interval or burst.
    pub fn new(config: &RateLimiterConfig) -> Result<Self> {
        let classes = config
            .overrides
            .iter()
            .map(|(class, cfg)| Ok((class.clone(), bucket(cfg)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self {
            enabled: config.enabled,
            default_bucket: bucket(&config.default_bucket)?,
            classes,
        })
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        let quota = Quota::per_second(NonZeroU32::MIN);
        Self {
            enabled: false,
            default_bucket: GovernorRateLimiter::direct(quota),
            classes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Wait for a token in `class`, falling back to the default bucket.
    pub async fn acquire(&self, class: &str) {
        if !self.enabled {
            return;
        }
        let bucket = self.classes.get(class).unwrap_or(&self.default_bucket);
        if bucket.check().is_err() {
            trace!(class, "Rate limit reached, waiting for token");
            bucket.until_ready().await;
        }
    }

    /// Take a token without waiting. Returns false when the bucket is empty.
    pub fn try_acquire(&self, class: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let bucket = self.classes.get(class).unwrap_or(&self.default_bucket);
        bucket.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.enabled)
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
