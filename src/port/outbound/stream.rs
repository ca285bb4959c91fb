//! Websocket ports: the socket and the venue's stream codec.
//!
//! The websocket core owns connection state, the subscription ledger and
//! request correlation. It reaches the network through [`WsDialer`] and
//! understands a venue's frames only through [`StreamProtocol`].

use async_trait::async_trait;

use crate::domain::{
    AssetClass, BookDelta, Credentials, Holdings, OrderDetail, Orderbook, Pair, Subscription,
    Ticker, Trade,
};
use crate::error::Result;

/// Transport-level websocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl WsMessage {
    /// Text payload, or UTF-8 decoded binary payload.
    #[must_use]
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(std::borrow::Cow::Borrowed(s)),
            Self::Binary(b) => Some(String::from_utf8_lossy(b)),
            _ => None,
        }
    }
}

/// Write half of a connection.
#[async_trait]
pub trait WsSink: Send {
    async fn send(&mut self, message: WsMessage) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a connection. `None` means the peer closed the stream.
#[async_trait]
pub trait WsSource: Send {
    async fn next(&mut self) -> Option<Result<WsMessage>>;
}

/// Opens websocket connections.
#[async_trait]
pub trait WsDialer: Send + Sync {
    async fn dial(&self, url: &str) -> Result<(Box<dyn WsSink>, Box<dyn WsSource>)>;
}

/// How a venue pairs responses with requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// Requests are not acknowledged; sending is success.
    None,
    /// Responses echo the request's message id.
    ById,
    /// Responses name the method; matched in send order.
    ByMethod,
}

/// An encoded request plus the method name used for correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub method: String,
    pub message: WsMessage,
}

impl Outbound {
    #[must_use]
    pub fn text(method: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: WsMessage::Text(body.into()),
        }
    }
}

/// A decoded stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Ticker(Ticker),
    BookSnapshot(Orderbook),
    BookDelta {
        pair: Pair,
        asset: AssetClass,
        delta: BookDelta,
    },
    Account(Holdings),
    Order(OrderDetail),
    Trade(Trade),
    /// Reply to a correlated request. `error` carries a venue rejection.
    Response {
        id: Option<i64>,
        method: Option<String>,
        payload: serde_json::Value,
        error: Option<String>,
    },
    Heartbeat,
    /// Decoded but not meaningful to the core; forwarded to diagnostics.
    Unhandled(String),
}

/// A venue's websocket codec.
pub trait StreamProtocol: Send + Sync {
    fn correlation(&self) -> Correlation {
        Correlation::None
    }

    /// Encode a subscribe request. `id` is a freshly allocated message id.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` when the channel is not offered.
    fn subscribe(&self, subscription: &Subscription, id: i64) -> Result<Outbound>;

    /// # Errors
    ///
    /// Returns `Unsupported` when the channel is not offered.
    fn unsubscribe(&self, subscription: &Subscription, id: i64) -> Result<Outbound>;

    /// Encode a login request. `None` means the venue needs no stream login.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    fn authenticate(&self, _credentials: &Credentials, _id: i64) -> Result<Option<Outbound>> {
        Ok(None)
    }

    /// Keep-alive message. Defaults to a transport ping.
    fn ping(&self) -> Option<WsMessage> {
        Some(WsMessage::Ping(Vec::new()))
    }

    /// Decode one inbound message into zero or more events.
    ///
    /// # Errors
    ///
    /// Returns `Decode` for payloads that cannot be parsed.
    fn decode(&self, message: &WsMessage) -> Result<Vec<StreamEvent>>;
}
