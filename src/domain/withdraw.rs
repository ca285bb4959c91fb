//! Normalised withdrawal requests, bank accounts and withdrawal records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::Capability;
use super::error::WithdrawError;
use super::pair::Currency;

/// Which withdrawal permission a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WithdrawKind {
    Crypto,
    Fiat,
    FiatInternational,
}

impl WithdrawKind {
    #[must_use]
    pub const fn capability(self) -> Capability {
        match self {
            Self::Crypto => Capability::CryptoWithdrawal,
            Self::Fiat => Capability::FiatWithdrawal,
            Self::FiatInternational => Capability::InternationalBankWithdrawal,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Fiat => "fiat",
            Self::FiatInternational => "fiat-international",
        }
    }
}

/// A configured bank account usable for fiat withdrawals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankAccount {
    pub enabled: bool,
    pub id: String,
    pub bank_name: String,
    pub bank_address: String,
    pub bank_postal_code: String,
    pub bank_postal_city: String,
    pub bank_country: String,
    pub account_name: String,
    pub account_number: String,
    pub swift_code: String,
    pub iban: String,
    pub bsb_number: String,
    /// Comma separated currency codes.
    pub supported_currencies: String,
    /// Comma separated venue names. Empty means any venue.
    pub supported_exchanges: String,
}

impl BankAccount {
    #[must_use]
    pub fn supports_currency(&self, currency: &Currency) -> bool {
        self.supported_currencies
            .split(',')
            .any(|c| Currency::new(c) == *currency)
    }

    #[must_use]
    pub fn supports_venue(&self, venue: &str) -> bool {
        let list = self.supported_exchanges.trim();
        list.is_empty()
            || list
                .split(',')
                .any(|v| v.trim().eq_ignore_ascii_case(venue))
    }

    /// # Errors
    ///
    /// Fails when the account is disabled or does not cover `venue` or
    /// `currency`.
    pub fn check_usable(&self, venue: &str, currency: &Currency) -> Result<(), WithdrawError> {
        if !self.enabled {
            return Err(WithdrawError::BankAccountDisabled {
                id: self.id.clone(),
            });
        }
        if !self.supports_venue(venue) {
            return Err(WithdrawError::BankAccountUnsupported {
                id: self.id.clone(),
                what: format!("venue {venue}"),
            });
        }
        if !self.supports_currency(currency) {
            return Err(WithdrawError::BankAccountUnsupported {
                id: self.id.clone(),
                what: format!("currency {currency}"),
            });
        }
        Ok(())
    }
}

/// On-chain destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoDestination {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default)]
    pub fee: Decimal,
}

/// Bank destination. The account is resolved from the bank store by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatDestination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<BankAccount>,
    #[serde(default)]
    pub international: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_currency: Option<Currency>,
    #[serde(default)]
    pub express_wire: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Destination {
    Crypto(CryptoDestination),
    Fiat(FiatDestination),
}

/// A withdrawal as submitted to a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub currency: Currency,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    /// Filled in by the withdraw manager when the venue requires OTP.
    #[serde(default, skip_serializing)]
    pub one_time_password: Option<String>,
    #[serde(default, skip_serializing)]
    pub trade_password: Option<String>,
    pub destination: Destination,
}

impl WithdrawRequest {
    #[must_use]
    pub fn crypto(
        currency: impl Into<Currency>,
        amount: Decimal,
        address: impl Into<String>,
    ) -> Self {
        Self {
            currency: currency.into(),
            amount,
            description: String::new(),
            one_time_password: None,
            trade_password: None,
            destination: Destination::Crypto(CryptoDestination {
                address: address.into(),
                ..Default::default()
            }),
        }
    }

    #[must_use]
    pub fn fiat(currency: impl Into<Currency>, amount: Decimal, international: bool) -> Self {
        Self {
            currency: currency.into(),
            amount,
            description: String::new(),
            one_time_password: None,
            trade_password: None,
            destination: Destination::Fiat(FiatDestination {
                international,
                ..Default::default()
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> WithdrawKind {
        match &self.destination {
            Destination::Crypto(_) => WithdrawKind::Crypto,
            Destination::Fiat(f) if f.international => WithdrawKind::FiatInternational,
            Destination::Fiat(_) => WithdrawKind::Fiat,
        }
    }

    #[must_use]
    pub fn bank_account(&self) -> Option<&BankAccount> {
        match &self.destination {
            Destination::Fiat(f) => f.bank_account.as_ref(),
            Destination::Crypto(_) => None,
        }
    }

    /// Checks that do not depend on a resolved bank account.
    ///
    /// # Errors
    ///
    /// Returns the first failed rule.
    pub fn validate_basic(&self) -> Result<(), WithdrawError> {
        if self.currency.is_empty() {
            return Err(WithdrawError::CurrencyEmpty);
        }
        if self.amount <= Decimal::ZERO {
            return Err(WithdrawError::AmountNotPositive);
        }
        if let Destination::Crypto(c) = &self.destination {
            if c.address.trim().is_empty() {
                return Err(WithdrawError::AddressEmpty);
            }
        }
        Ok(())
    }

    /// Full validation, including the bank account for fiat requests.
    ///
    /// # Errors
    ///
    /// Returns the first failed rule.
    pub fn validate(&self) -> Result<(), WithdrawError> {
        self.validate_basic()?;
        if let Destination::Fiat(f) = &self.destination {
            match &f.bank_account {
                None => return Err(WithdrawError::BankAccountMissing),
                Some(account) if !account.enabled => {
                    return Err(WithdrawError::BankAccountDisabled {
                        id: account.id.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// What a venue returns for an accepted withdrawal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    /// Venue-side identifier.
    pub id: String,
    pub status: String,
}

/// Persisted record of a submitted withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawEvent {
    pub id: Uuid,
    pub venue: String,
    pub venue_id: String,
    pub status: String,
    pub request: WithdrawRequest,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl WithdrawEvent {
    #[must_use]
    pub fn new(
        venue: impl Into<String>,
        request: &WithdrawRequest,
        response: &WithdrawResponse,
    ) -> Self {
        let now = Utc::now();
        let mut request = request.clone();
        request.one_time_password = None;
        request.trade_password = None;
        Self {
            id: Uuid::new_v4(),
            venue: venue.into(),
            venue_id: response.id.clone(),
            status: response.status.clone(),
            request,
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn kind(&self) -> WithdrawKind {
        self.request.kind()
    }
}
