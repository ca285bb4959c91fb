//! Validation errors for requests built from domain types.
//!
//! These are wrapped by [`crate::error::Error`] as `InvalidSubmit` and
//! `InvalidWithdraw`, and each variant names the first rule that failed.

use thiserror::Error;

/// Reasons an order submission fails local validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("order pair is empty")]
    PairEmpty,

    #[error("order side is invalid: {0}")]
    InvalidSide(String),

    #[error("order type is invalid: {0}")]
    InvalidType(String),

    #[error("order amount must be greater than zero")]
    AmountNotPositive,

    #[error("price must be set if limit order type is desired")]
    PriceMustBeSetForLimit,

    #[error("order price cannot be negative")]
    PriceNegative,
}

/// Reasons a withdrawal request fails local validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WithdrawError {
    #[error("withdrawal currency is empty")]
    CurrencyEmpty,

    #[error("withdrawal amount must be greater than zero")]
    AmountNotPositive,

    #[error("crypto withdrawal requires a destination address")]
    AddressEmpty,

    #[error("fiat withdrawal requires a bank account")]
    BankAccountMissing,

    #[error("bank account {id} is disabled")]
    BankAccountDisabled { id: String },

    #[error("bank account {id} does not support {what}")]
    BankAccountUnsupported { id: String, what: String },
}
