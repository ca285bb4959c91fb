//! Deposit addresses, funding history and fee queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pair::{Currency, Pair};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAddress {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Deposit,
    Withdrawal,
}

/// One deposit or withdrawal as reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRecord {
    pub id: String,
    pub direction: TransferDirection,
    pub status: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeType {
    MakerTrade,
    TakerTrade,
    CryptoDeposit,
    CryptoWithdrawal,
    BankDeposit,
    BankWithdrawal,
    InternationalBankWithdrawal,
}

impl FeeType {
    #[must_use]
    pub const fn is_trade(self) -> bool {
        matches!(self, Self::MakerTrade | Self::TakerTrade)
    }
}

/// Input for a fee estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRequest {
    pub fee_type: FeeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<Pair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    pub amount: Decimal,
    #[serde(default)]
    pub price: Decimal,
}

impl FeeRequest {
    /// Notional the fee applies to: `amount * price` for trades, else `amount`.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        if self.fee_type.is_trade() {
            self.amount * self.price
        } else {
            self.amount
        }
    }
}
