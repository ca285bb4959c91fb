//! Rate limiter configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One token bucket: a token every `interval_ms`, at most `burst` stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketConfig {
    pub interval_ms: u64,
    pub burst: u32,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            burst: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterConfig {
    /// When false every acquisition succeeds immediately.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub default_bucket: BucketConfig,
    /// Buckets keyed by endpoint class, e.g. `auth` or `orders`.
    #[serde(default)]
    pub overrides: BTreeMap<String, BucketConfig>,
}

fn default_enabled() -> bool {
    true
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_bucket: BucketConfig::default(),
            overrides: BTreeMap::new(),
        }
    }
}
