//! Error types for the crate.
//!
//! Every failure surfaced by the engine is an [`Error`]. Callers that need to
//! branch on the category rather than the concrete variant use
//! [`Error::kind`], which maps each variant onto an [`ErrorKind`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{SubmitError, WithdrawError};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Category of an [`Error`], independent of the variant payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotYetImplemented,
    Unsupported,
    InvalidPair,
    InvalidAsset,
    InvalidExchange,
    InvalidSubmit,
    InvalidInput,
    AuthRequired,
    AuthRejected,
    RateLimited,
    DecodeError,
    WsTimeout,
    WsClosed,
    WsProtocol,
    OtpRejected,
    NotFound,
    VenueError,
    DuplicateTrade,
    Transport,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{venue}: {operation} is not yet implemented")]
    NotYetImplemented {
        venue: String,
        operation: &'static str,
    },

    #[error("{venue}: {feature} is not supported")]
    Unsupported { venue: String, feature: String },

    #[error("invalid pair: {0}")]
    InvalidPair(String),

    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    #[error("invalid exchange: {0}")]
    InvalidExchange(String),

    #[error("invalid order submission: {0}")]
    InvalidSubmit(#[from] SubmitError),

    #[error("invalid withdrawal request: {0}")]
    InvalidWithdraw(#[from] WithdrawError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{venue}: authenticated request requires credentials")]
    AuthRequired { venue: String },

    #[error("{venue}: authentication rejected: {reason}")]
    AuthRejected { venue: String, reason: String },

    #[error("{venue}: rate limited")]
    RateLimited {
        venue: String,
        retry_after: Option<Duration>,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket request timed out: {request}")]
    WsTimeout { request: String },

    #[error("websocket connection closed")]
    WsClosed,

    #[error("websocket protocol error: {0}")]
    WsProtocol(String),

    #[error("{venue}: one-time password rejected: {reason}")]
    OtpRejected { venue: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{venue} returned error {code}: {message}")]
    Venue {
        venue: String,
        code: String,
        message: String,
    },

    #[error("duplicate trade id {id}")]
    DuplicateTrade { id: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl Error {
    /// Map this error onto its taxonomy kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotYetImplemented { .. } => ErrorKind::NotYetImplemented,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::InvalidPair(_) => ErrorKind::InvalidPair,
            Self::InvalidAsset(_) => ErrorKind::InvalidAsset,
            Self::InvalidExchange(_) => ErrorKind::InvalidExchange,
            Self::InvalidSubmit(_) => ErrorKind::InvalidSubmit,
            Self::InvalidWithdraw(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::AuthRequired { .. } => ErrorKind::AuthRequired,
            Self::AuthRejected { .. } => ErrorKind::AuthRejected,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Decode(_) | Self::Json(_) => ErrorKind::DecodeError,
            Self::WsTimeout { .. } => ErrorKind::WsTimeout,
            Self::WsClosed => ErrorKind::WsClosed,
            Self::WsProtocol(_) => ErrorKind::WsProtocol,
            Self::OtpRejected { .. } => ErrorKind::OtpRejected,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Venue { .. } => ErrorKind::VenueError,
            Self::DuplicateTrade { .. } => ErrorKind::DuplicateTrade,
            Self::Config(_) => ErrorKind::Config,
            Self::Http(_)
            | Self::HttpStatus { .. }
            | Self::WebSocket(_)
            | Self::Io(_)
            | Self::Url(_)
            | Self::Connection(_) => ErrorKind::Transport,
        }
    }

    /// Whether the failure is worth retrying (network faults, 5xx, 429).
    ///
    /// The engine never retries on its own; this only informs the caller.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::RateLimited { .. } | Self::Connection(_) | Self::WebSocket(_) => true,
            Self::Io(_) | Self::WsTimeout { .. } => true,
            _ => false,
        }
    }

    pub fn not_yet_implemented(venue: impl Into<String>, operation: &'static str) -> Self {
        Self::NotYetImplemented {
            venue: venue.into(),
            operation,
        }
    }

    pub fn unsupported(venue: impl Into<String>, feature: impl fmt::Display) -> Self {
        Self::Unsupported {
            venue: venue.into(),
            feature: feature.to_string(),
        }
    }
}

/// Whether a caller may retry the operation that produced `err`.
#[must_use]
pub fn check_transient_error(err: &Error) -> bool {
    err.is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_error_preserves_code_and_message() {
        let err = Error::Venue {
            venue: "kraken".into(),
            code: "EOrder:Insufficient funds".into(),
            message: "insufficient funds".into(),
        };
        assert_eq!(err.kind(), ErrorKind::VenueError);
        let text = err.to_string();
        assert!(text.contains("EOrder:Insufficient funds"));
        assert!(text.contains("insufficient funds"));
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = Error::HttpStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        let client = Error::HttpStatus {
            status: 400,
            body: "bad request".into(),
        };
        assert!(check_transient_error(&server));
        assert!(!check_transient_error(&client));
        assert_eq!(client.kind(), ErrorKind::Transport);
    }

    #[test]
    fn decode_failures_share_a_kind() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(Error::from(json_err).kind(), ErrorKind::DecodeError);
        assert_eq!(Error::Decode("x".into()).kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn rate_limited_is_retriable() {
        let err = Error::RateLimited {
            venue: "v".into(),
            retry_after: Some(Duration::from_secs(1)),
        };
        assert!(err.is_transient());
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }
}
