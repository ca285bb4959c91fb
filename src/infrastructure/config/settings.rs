//! Engine configuration loading and validation.
//!
//! Provides the main [`Config`] struct. Configuration is a JSON document that
//! keeps the legacy field names so existing files load unchanged. Credentials
//! may be overridden from the environment (including a `.env` file) with
//! `TRADEPLEX_<VENUE>_API_KEY`, `_API_SECRET` and `_OTP_SECRET`.
//!
//! # Example
//!
//! ```no_run
//! use tradeplex::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.json")?;
//!     config.logging.init();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration::nanos;
use super::limiter::RateLimiterConfig;
use super::logging::LoggingConfig;
use super::stream::StreamConfig;
use super::venue::VenueConfig;
use crate::domain::BankAccount;
use crate::error::{ConfigError, Result};

/// Connection settings handed to the external persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub verbose: bool,
    pub driver: String,
    pub connection_details: serde_json::Value,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Timeout applied to venues that do not set their own.
    #[serde(
        rename = "globalHTTPTimeout",
        default = "default_global_http_timeout",
        with = "nanos"
    )]
    pub global_http_timeout: Duration,

    #[serde(default)]
    pub exchanges: Vec<VenueConfig>,

    /// Relay settings, carried opaquely for the communications collaborator.
    #[serde(default)]
    pub communications: serde_json::Value,

    #[serde(default)]
    pub bank_accounts: Vec<BankAccount>,

    #[serde(default)]
    pub websocket: StreamConfig,

    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,
}

const fn default_global_http_timeout() -> Duration {
    Duration::from_secs(15)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: String::new(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            global_http_timeout: default_global_http_timeout(),
            exchanges: Vec::new(),
            communications: serde_json::Value::Null,
            bank_accounts: Vec::new(),
            websocket: StreamConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
        }
    }
}

fn env_key(venue: &str, suffix: &str) -> String {
    let venue: String = venue
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("TRADEPLEX_{venue}_{suffix}")
}

impl Config {
    /// Parse configuration from JSON content and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or validation fails.
    pub fn parse_json(content: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The JSON content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_json(&content)
    }

    /// Render back to pretty JSON with legacy field names.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn apply_env_overrides(&mut self) {
        for venue in &mut self.exchanges {
            let creds = &mut venue.api.credentials;
            if let Ok(key) = std::env::var(env_key(&venue.name, "API_KEY")) {
                creds.key = key;
            }
            if let Ok(secret) = std::env::var(env_key(&venue.name, "API_SECRET")) {
                creds.secret = secret;
            }
            if let Ok(otp) = std::env::var(env_key(&venue.name, "OTP_SECRET")) {
                creds.otp_secret = otp;
            }
        }
    }

    /// Look up a venue entry by case-insensitive name.
    #[must_use]
    pub fn venue(&self, name: &str) -> Option<&VenueConfig> {
        self.exchanges
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for venue in &self.exchanges {
            venue.validate()?;
            if !names.insert(venue.name.to_ascii_lowercase()) {
                return Err(ConfigError::InvalidValue {
                    field: "exchanges",
                    reason: format!("duplicate venue name {}", venue.name),
                }
                .into());
            }
        }

        let mut ids = HashSet::new();
        for account in &self.bank_accounts {
            if account.id.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "bankAccounts.id",
                }
                .into());
            }
            if !ids.insert(account.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "bankAccounts",
                    reason: format!("duplicate bank account id {}", account.id),
                }
                .into());
            }
        }

        if self.global_http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "globalHTTPTimeout",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let reconnection = &self.websocket.reconnection;
        if reconnection.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initialDelayMs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if reconnection.max_delay_ms < reconnection.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "maxDelayMs",
                reason: "must be >= initialDelayMs".to_string(),
            }
            .into());
        }
        if reconnection.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoffMultiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }
        if self.websocket.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channelCapacity",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.websocket.max_decode_failures == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxDecodeFailures",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let limiter = &self.rate_limiter;
        let buckets = std::iter::once(&limiter.default_bucket).chain(limiter.overrides.values());
        for bucket in buckets {
            if bucket.burst == 0 || bucket.interval_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "rateLimiter",
                    reason: "interval and burst must be greater than 0".to_string(),
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
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "name": "Engine",
        "globalHTTPTimeout": 15000000000,
        "exchanges": [
            { "name": "Alpha", "enabled": true },
            { "name": "Beta", "enabled": false }
        ],
        "communications": { "slack": { "enabled": false } },
        "bankAccounts": [ { "id": "b1", "enabled": true, "supportedCurrencies": "USD" } ]
    }"#;

    #[test]
    fn parses_minimal_document() {
        let config = Config::parse_json(MINIMAL).unwrap();
        assert_eq!(config.exchanges.len(), 2);
        assert!(config.venue("alpha").is_some());
        assert_eq!(config.websocket.max_decode_failures, 3);
        assert_eq!(config.bank_accounts[0].id, "b1");
        assert!(config.communications.get("slack").is_some());
    }

    #[test]
    fn rejects_duplicate_venue_names() {
        let raw = MINIMAL.replace(r#""name": "Beta""#, r#""name": "ALPHA""#);
        assert!(Config::parse_json(&raw).is_err());
    }

    #[test]
    fn rejects_zero_burst() {
        let raw = MINIMAL.replace(
            r#""name": "Engine","#,
            r#""name": "Engine", "rateLimiter": { "burst": 0 },"#,
        );
        assert!(Config::parse_json(&raw).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.name, "Engine");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load("/nonexistent/tradeplex.json").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Config(ConfigError::ReadFile(_))
        ));
    }

    #[test]
    fn env_key_normalises_names() {
        assert_eq!(env_key("Huobi.Pro", "API_KEY"), "TRADEPLEX_HUOBI_PRO_API_KEY");
    }
}
