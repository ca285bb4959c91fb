//! Feature flags a venue declares.
//!
//! Cross-cutting operations check the relevant [`Capability`] first and fail
//! with `Unsupported` when the venue does not declare it.

use std::fmt;

use crate::error::{Error, Result};

/// A single declared feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Capability {
    TickerFetching,
    TickerBatching,
    OrderbookFetching,
    AutoPairUpdates,
    AccountInfo,
    KlineFetching,
    SubmitOrder,
    ModifyOrder,
    CancelOrder,
    CancelOrders,
    GetOrder,
    GetOrders,
    UserTradeHistory,
    TradeFee,
    CryptoDeposit,
    CryptoWithdrawal,
    FiatWithdrawal,
    InternationalBankWithdrawal,
    DepositHistory,
    WithdrawalHistory,
    WithdrawalRequiresOtp,
    Websocket,
    WebsocketAuthenticated,
    WebsocketTicker,
    WebsocketOrderbook,
    WebsocketTrades,
    WebsocketAccount,
    WebsocketOrders,
    WebsocketMessageCorrelation,
}

impl Capability {
    pub const ALL: [Capability; 29] = [
        Self::TickerFetching,
        Self::TickerBatching,
        Self::OrderbookFetching,
        Self::AutoPairUpdates,
        Self::AccountInfo,
        Self::KlineFetching,
        Self::SubmitOrder,
        Self::ModifyOrder,
        Self::CancelOrder,
        Self::CancelOrders,
        Self::GetOrder,
        Self::GetOrders,
        Self::UserTradeHistory,
        Self::TradeFee,
        Self::CryptoDeposit,
        Self::CryptoWithdrawal,
        Self::FiatWithdrawal,
        Self::InternationalBankWithdrawal,
        Self::DepositHistory,
        Self::WithdrawalHistory,
        Self::WithdrawalRequiresOtp,
        Self::Websocket,
        Self::WebsocketAuthenticated,
        Self::WebsocketTicker,
        Self::WebsocketOrderbook,
        Self::WebsocketTrades,
        Self::WebsocketAccount,
        Self::WebsocketOrders,
        Self::WebsocketMessageCorrelation,
    ];

    const fn bit(self) -> u64 {
        1 << (self as u8)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TickerFetching => "ticker fetching",
            Self::TickerBatching => "ticker batching",
            Self::OrderbookFetching => "orderbook fetching",
            Self::AutoPairUpdates => "automatic pair updates",
            Self::AccountInfo => "account information",
            Self::KlineFetching => "kline fetching",
            Self::SubmitOrder => "order submission",
            Self::ModifyOrder => "order modification",
            Self::CancelOrder => "order cancellation",
            Self::CancelOrders => "bulk order cancellation",
            Self::GetOrder => "order lookup",
            Self::GetOrders => "order listing",
            Self::UserTradeHistory => "user trade history",
            Self::TradeFee => "trade fee lookup",
            Self::CryptoDeposit => "crypto deposit",
            Self::CryptoWithdrawal => "crypto withdrawal",
            Self::FiatWithdrawal => "fiat withdrawal",
            Self::InternationalBankWithdrawal => "international bank withdrawal",
            Self::DepositHistory => "deposit history",
            Self::WithdrawalHistory => "withdrawal history",
            Self::WithdrawalRequiresOtp => "withdrawal one-time password",
            Self::Websocket => "websocket",
            Self::WebsocketAuthenticated => "authenticated websocket",
            Self::WebsocketTicker => "websocket ticker",
            Self::WebsocketOrderbook => "websocket orderbook",
            Self::WebsocketTrades => "websocket trades",
            Self::WebsocketAccount => "websocket account",
            Self::WebsocketOrders => "websocket orders",
            Self::WebsocketMessageCorrelation => "websocket message correlation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit set of [`Capability`] values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u64);

impl Capabilities {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    #[must_use]
    pub const fn supports(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Fail with `Unsupported` unless `capability` is declared.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` naming the venue and feature.
    pub fn require(self, venue: &str, capability: Capability) -> Result<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(Error::unsupported(venue, capability))
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.supports(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(Capability::name).collect();
        f.write_str(&names.join(", "))
    }
}
