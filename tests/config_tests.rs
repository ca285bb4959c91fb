use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

use tradeplex::domain::{AssetClass, Pair};
use tradeplex::error::{ConfigError, Error};
use tradeplex::infrastructure::config::Config;

const CONFIG: &str = r#"{
    "name": "desk",
    "globalHTTPTimeout": 15000000000,
    "logging": { "level": "debug", "format": "json" },
    "exchanges": [
        {
            "name": "Binance",
            "enabled": true,
            "httpTimeout": 10000000000,
            "api": {
                "authenticatedSupport": true,
                "credentials": { "key": "k", "secret": "s" }
            },
            "features": { "enabled": { "websocketAPI": true, "autoPairUpdates": true } },
            "currencyPairs": {
                "pairs": {
                    "spot": { "assetEnabled": true, "enabled": "BTC-USDT", "available": "BTC-USDT,ETH-USDT" }
                }
            }
        }
    ],
    "bankAccounts": [
        { "enabled": true, "id": "acct-1", "supportedCurrencies": "USD,EUR" }
    ]
}"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_legacy_json_document() {
    let file = write_temp(CONFIG);
    let config = assert_ok!(Config::load(file.path()));

    assert_eq!(config.name, "desk");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.global_http_timeout, Duration::from_secs(15));

    let venue = config.venue("binance").unwrap();
    assert_eq!(venue.http_timeout, Duration::from_secs(10));
    assert!(venue.features.enabled.websocket_api);
    let spot = &venue.currency_pairs.pairs[&AssetClass::Spot];
    assert!(spot.enabled.contains(&Pair::new("BTC", "USDT").unwrap()));
    assert_eq!(spot.available.len(), 2);
    assert_eq!(config.bank_accounts[0].id, "acct-1");
}

#[test]
fn round_trips_through_json() {
    let config = Config::parse_json(CONFIG).unwrap();
    let again = Config::parse_json(&config.to_json().unwrap()).unwrap();
    assert_eq!(config, again);
}

#[test]
fn rejects_duplicate_venues() {
    let doubled = CONFIG.replace(
        r#""exchanges": ["#,
        r#""exchanges": [ { "name": "binance" },"#,
    );
    match Config::parse_json(&doubled) {
        Err(Error::Config(ConfigError::InvalidValue { field: "exchanges", .. })) => {}
        other => panic!("expected duplicate venue error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_a_read_error() {
    let err = assert_err!(Config::load("/nonexistent/tradeplex.json"));
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let file = write_temp("{ not json");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
}
