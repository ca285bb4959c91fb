//! Tradeplex - a multi-venue cryptocurrency trading engine core.
//!
//! One uniform [`Venue`](port::Venue) contract covers every exchange, with
//! shared caches for tickers, order books, holdings and orders, a validated
//! order and withdrawal pipeline, and a websocket manager that keeps
//! subscriptions alive across reconnects.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Venue-agnostic types: pairs, books, orders, klines
//! - **`port`** - Traits at the seams: venue contract, transports, stores
//! - **`application`** - Engine, registry, caches, order and withdraw managers
//! - **`infrastructure`** - Config, rate limiting, request signing, OTP, websockets
//! - **`adapter`** - Concrete reqwest/tungstenite transports and the Binance venue
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tradeplex::adapter::outbound::MemoryWithdrawStore;
//! use tradeplex::application::{Engine, VenueFactories};
//! use tradeplex::infrastructure::config::Config;
//!
//! # async fn run() -> tradeplex::error::Result<()> {
//! let config = Config::load("config.json")?;
//! let engine = Engine::bootstrap(
//!     config,
//!     &VenueFactories::new(),
//!     Arc::new(MemoryWithdrawStore::new()),
//! )
//! .await?;
//! let failed = engine.start().await;
//! assert!(failed.is_empty());
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
