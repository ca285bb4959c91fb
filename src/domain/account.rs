//! Account holdings per venue and sub-account.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::pair::Currency;

/// Balance of one currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: Decimal,
    pub hold: Decimal,
}

impl Balance {
    #[must_use]
    pub const fn new(total: Decimal, hold: Decimal) -> Self {
        Self { total, hold }
    }

    /// `total - hold`.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.total - self.hold
    }
}

/// One sub-account on a venue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubAccount {
    pub id: String,
    pub asset: Option<AssetClass>,
    pub balances: BTreeMap<Currency, Balance>,
}

impl SubAccount {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            asset: None,
            balances: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_balance(mut self, currency: impl Into<Currency>, balance: Balance) -> Self {
        self.balances.insert(currency.into(), balance);
        self
    }
}

/// Every sub-account a venue reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    pub venue: String,
    pub accounts: Vec<SubAccount>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Holdings {
    #[must_use]
    pub fn new(venue: impl Into<String>, accounts: Vec<SubAccount>) -> Self {
        Self {
            venue: venue.into(),
            accounts,
            last_updated: Utc::now(),
        }
    }

    /// Sum of a currency's balances across sub-accounts.
    #[must_use]
    pub fn total(&self, currency: &Currency) -> Balance {
        self.accounts
            .iter()
            .filter_map(|a| a.balances.get(currency))
            .fold(Balance::default(), |acc, b| {
                Balance::new(acc.total + b.total, acc.hold + b.hold)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn available_is_total_minus_hold() {
        assert_eq!(Balance::new(dec!(10), dec!(2.5)).available(), dec!(7.5));
    }

    #[test]
    fn totals_span_sub_accounts() {
        let holdings = Holdings::new(
            "v",
            vec![
                SubAccount::new("main").with_balance("BTC", Balance::new(dec!(1), dec!(0))),
                SubAccount::new("margin").with_balance("btc", Balance::new(dec!(2), dec!(1))),
            ],
        );
        let btc = holdings.total(&Currency::new("BTC"));
        assert_eq!(btc.total, dec!(3));
        assert_eq!(btc.available(), dec!(2));
    }
}
