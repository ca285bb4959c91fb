//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`]: `MockTransport`, a scripted [`HttpTransport`](crate::port::HttpTransport).
//! - [`stream`]: `ChannelDialer`, `ServerEnd` and `MockProtocol` for
//!   driving the websocket manager without sockets.
//! - [`venue`]: `MockVenue`, an in-memory exchange.
//! - [`fixtures`]: Canonical pairs, orders, submissions and config entries.

pub mod fixtures;
pub mod stream;
pub mod transport;
pub mod venue;
