//! Ready-made domain values and config entries.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    AssetClass, BankAccount, OrderDetail, OrderStatus, OrderType, Pair, Pairs, PairStore, Side,
    Submit,
};
use crate::infrastructure::config::{Credentials, VenueConfig};

pub fn btc_usd() -> Pair {
    Pair::new("BTC", "USD").expect("valid pair")
}

/// A resting one-unit limit buy at 100 with nothing filled.
pub fn order(venue: &str, id: &str, status: OrderStatus) -> OrderDetail {
    let now = Utc::now();
    OrderDetail {
        venue: venue.to_string(),
        id: id.to_string(),
        internal_id: None,
        client_order_id: None,
        pair: btc_usd(),
        asset: AssetClass::Spot,
        side: Side::Buy,
        order_type: OrderType::Limit,
        status,
        price: dec!(100),
        amount: dec!(1),
        executed_amount: Decimal::ZERO,
        remaining_amount: dec!(1),
        fee: Decimal::ZERO,
        date: now,
        last_updated: now,
        trades: Vec::new(),
    }
}

pub fn limit_buy(price: Decimal, amount: Decimal) -> Submit {
    Submit {
        pair: btc_usd(),
        asset: AssetClass::Spot,
        side: Side::Buy,
        order_type: OrderType::Limit,
        price,
        amount,
        trigger_price: None,
        client_order_id: None,
        reduce_only: false,
    }
}

/// Enabled, keyed and trading BTC-USD spot out of BTC-USD and ETH-USD.
pub fn venue_config(name: &str) -> VenueConfig {
    let mut config = VenueConfig::named(name);
    config.api.authenticated_support = true;
    config.api.credentials = Credentials::new("test-key", "test-secret");

    let mut available = Pairs::new();
    available.add(btc_usd());
    available.add(Pair::new("ETH", "USD").expect("valid pair"));
    let mut enabled = Pairs::new();
    enabled.add(btc_usd());
    config.currency_pairs.pairs.insert(
        AssetClass::Spot,
        PairStore {
            asset_enabled: Some(true),
            enabled,
            available,
            ..PairStore::default()
        },
    );
    config
}

/// An enabled account usable on every venue.
pub fn bank_account(id: &str, currencies: &str) -> BankAccount {
    BankAccount {
        enabled: true,
        id: id.to_string(),
        bank_name: "Test Bank".into(),
        account_name: "Trading Desk".into(),
        account_number: "12345678".into(),
        swift_code: "TESTAU2S".into(),
        supported_currencies: currencies.to_string(),
        ..BankAccount::default()
    }
}
