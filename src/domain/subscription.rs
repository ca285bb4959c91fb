//! Streaming subscriptions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::pair::Pair;

/// Well-known channel names used by default subscriptions.
pub mod channel {
    pub const TICKER: &str = "ticker";
    pub const ORDERBOOK: &str = "orderbook";
    pub const TRADES: &str = "trades";
    pub const ACCOUNT: &str = "account";
    pub const ORDERS: &str = "orders";
}

/// One streaming subscription. Identity is the whole tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<Pair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetClass>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Subscription {
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            pair: None,
            asset: None,
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn for_pair(channel: impl Into<String>, pair: Pair, asset: AssetClass) -> Self {
        Self {
            pair: Some(pair),
            asset: Some(asset),
            ..Self::new(channel)
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel)?;
        if let Some(pair) = &self.pair {
            write!(f, ":{}-{}", pair.base, pair.quote)?;
        }
        if let Some(asset) = self.asset {
            write!(f, ":{asset}")?;
        }
        Ok(())
    }
}
