//! Per-venue configuration, using the legacy JSON field names.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration::nanos;
pub use crate::domain::Credentials;
use crate::domain::{BankAccount, PairManager};
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    pub authenticated_support: bool,
    #[serde(rename = "authenticatedWebsocketApiSupport")]
    pub authenticated_websocket_support: bool,
    pub credentials: Credentials,
    /// Named endpoint overrides, e.g. `RestSpotURL`.
    pub url_endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    #[serde(rename = "websocketAPI")]
    pub websocket_api: bool,
    #[serde(rename = "autoPairUpdates")]
    pub auto_pair_updates: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub enabled: FeatureToggles,
}

/// Streaming orderbook buffer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderbookConfig {
    #[serde(default)]
    pub verification_bypass: bool,
    #[serde(default = "default_buffer_limit")]
    pub websocket_buffer_limit: usize,
    #[serde(default)]
    pub websocket_buffer_enabled: bool,
    /// Apply buffered deltas in sequence order instead of arrival order.
    #[serde(default)]
    pub sort_buffer: bool,
    /// Hold sorted deltas behind a sequence gap. Only for venues whose
    /// sequence numbers are contiguous.
    #[serde(default)]
    pub strict_sequence: bool,
    /// Deltas kept while a snapshot is being fetched; older ones are dropped.
    #[serde(default = "default_snapshot_wait_limit")]
    pub snapshot_wait_limit: usize,
    #[serde(default = "default_publish_period", with = "nanos")]
    pub publish_period: Duration,
}

const fn default_buffer_limit() -> usize {
    5
}

const fn default_snapshot_wait_limit() -> usize {
    10_000
}

const fn default_publish_period() -> Duration {
    Duration::from_secs(10)
}

impl Default for OrderbookConfig {
    fn default() -> Self {
        Self {
            verification_bypass: false,
            websocket_buffer_limit: default_buffer_limit(),
            websocket_buffer_enabled: false,
            sort_buffer: false,
            strict_sequence: false,
            snapshot_wait_limit: default_snapshot_wait_limit(),
            publish_period: default_publish_period(),
        }
    }
}

/// Configuration for one venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_http_timeout", with = "nanos")]
    pub http_timeout: Duration,
    /// How often expired correlated requests are swept.
    #[serde(default = "default_response_check_timeout", with = "nanos")]
    pub websocket_response_check_timeout: Duration,
    /// Deadline for a correlated websocket response.
    #[serde(default = "default_response_max_limit", with = "nanos")]
    pub websocket_response_max_limit: Duration,
    /// Silence after which a connection is considered dead.
    #[serde(default = "default_traffic_timeout", with = "nanos")]
    pub websocket_traffic_timeout: Duration,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub currency_pairs: PairManager,
    #[serde(default)]
    pub orderbook: OrderbookConfig,
    #[serde(default)]
    pub bank_accounts: Vec<BankAccount>,
}

const fn default_http_timeout() -> Duration {
    Duration::from_secs(15)
}

const fn default_response_check_timeout() -> Duration {
    Duration::from_millis(50)
}

const fn default_response_max_limit() -> Duration {
    Duration::from_secs(7)
}

const fn default_traffic_timeout() -> Duration {
    Duration::from_secs(30)
}

impl VenueConfig {
    /// Defaults for a venue with no pair stores.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            verbose: false,
            http_timeout: default_http_timeout(),
            websocket_response_check_timeout: default_response_check_timeout(),
            websocket_response_max_limit: default_response_max_limit(),
            websocket_traffic_timeout: default_traffic_timeout(),
            api: ApiConfig::default(),
            features: FeaturesConfig::default(),
            currency_pairs: PairManager::default(),
            orderbook: OrderbookConfig::default(),
            bank_accounts: Vec::new(),
        }
    }

    /// Check this entry in isolation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "name" }.into());
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "httpTimeout",
                reason: format!("{} must be greater than 0", self.name),
            }
            .into());
        }
        if self.websocket_response_max_limit.is_zero() || self.websocket_traffic_timeout.is_zero()
        {
            return Err(ConfigError::InvalidValue {
                field: "websocketResponseMaxLimit",
                reason: format!("{} websocket timeouts must be greater than 0", self.name),
            }
            .into());
        }
        if self.orderbook.websocket_buffer_enabled && self.orderbook.websocket_buffer_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "websocketBufferLimit",
                reason: format!("{} buffer is enabled with zero capacity", self.name),
            }
            .into());
        }
        for (asset, store) in &self.currency_pairs.pairs {
            if !store.available.contains_all(&store.enabled) {
                return Err(ConfigError::InvalidValue {
                    field: "currencyPairs",
                    reason: format!(
                        "{} {asset}: enabled pairs must be a subset of available pairs",
                        self.name
                    ),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetClass;

    const ENTRY: &str = r#"{
        "name": "Bitstamp",
        "enabled": true,
        "httpTimeout": 20000000000,
        "api": {
            "authenticatedSupport": true,
            "credentials": { "key": "k", "secret": "s", "clientID": "c", "otpSecret": "" }
        },
        "features": { "enabled": { "websocketAPI": true, "autoPairUpdates": false } },
        "currencyPairs": {
            "requestFormat": { "uppercase": false, "delimiter": "" },
            "pairs": {
                "spot": { "assetEnabled": true, "enabled": "BTC-USD", "available": "BTC-USD,ETH-USD" }
            }
        },
        "orderbook": {
            "websocketBufferLimit": 10,
            "websocketBufferEnabled": true,
            "strictSequence": true,
            "publishPeriod": 1000000000
        }
    }"#;

    #[test]
    fn parses_legacy_field_names() {
        let cfg: VenueConfig = serde_json::from_str(ENTRY).unwrap();
        assert_eq!(cfg.http_timeout, Duration::from_secs(20));
        assert_eq!(cfg.api.credentials.client_id, "c");
        assert!(cfg.features.enabled.websocket_api);
        assert_eq!(cfg.orderbook.websocket_buffer_limit, 10);
        assert!(cfg.orderbook.strict_sequence);
        assert_eq!(cfg.orderbook.snapshot_wait_limit, 10_000);
        assert_eq!(cfg.websocket_response_max_limit, Duration::from_secs(7));
        let spot = &cfg.currency_pairs.pairs[&AssetClass::Spot];
        assert_eq!(spot.available.len(), 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn enabled_must_be_available() {
        let raw = ENTRY.replace(r#""enabled": "BTC-USD""#, r#""enabled": "LTC-USD""#);
        let cfg: VenueConfig = serde_json::from_str(&raw).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_masks_secrets() {
        let creds = Credentials::new("key", "hunter2");
        let out = format!("{creds:?}");
        assert!(!out.contains("hunter2"));
        assert!(creds.is_present());
    }
}
