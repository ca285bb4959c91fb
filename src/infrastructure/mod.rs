//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! trading logic.
//!
//! # Submodules
//!
//! - [`config`] - JSON configuration loading and validation
//! - [`limiter`] - Token-bucket rate limiting per endpoint class
//! - [`otp`] - One-time passwords for withdrawals
//! - [`request`] - REST dispatch: nonces, signing, status mapping
//! - [`websocket`] - Connection lifecycle, subscriptions, correlation

pub mod config;
pub mod limiter;
pub mod otp;
pub mod request;
pub mod websocket;
