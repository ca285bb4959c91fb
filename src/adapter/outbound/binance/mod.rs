//! Binance spot integration.
//!
//! REST market data, signed account and order endpoints, and the public
//! market streams. Venue-wide settings come from the `binance` entry of the
//! engine config; the REST and stream base URLs can be overridden through
//! its `urlEndpoints`.

mod dto;
mod signer;
mod stream;
mod venue;

use std::sync::Arc;

pub use signer::BinanceSigner;
pub use stream::{symbol, BinanceProtocol, SymbolMap};
pub use venue::{Binance, REST_ENDPOINT_KEY, REST_URL, STREAM_ENDPOINT_KEY, STREAM_URL};

use crate::application::VenueFactory;
use crate::infrastructure::config::{RateLimiterConfig, StreamConfig};
use crate::infrastructure::limiter::RateLimiter;
use crate::port::{HttpTransport, Venue, WsDialer};

pub const NAME: &str = "binance";

/// Constructor for the venue registry.
pub fn factory(
    transport: Arc<dyn HttpTransport>,
    dialer: Arc<dyn WsDialer>,
    stream: StreamConfig,
    limits: RateLimiterConfig,
) -> VenueFactory {
    Arc::new(move |config, store| {
        let limiter = RateLimiter::new(&limits)?;
        let venue = Binance::new(
            config,
            store,
            Arc::clone(&transport),
            Arc::clone(&dialer),
            &stream,
            limiter,
        );
        Ok(Arc::new(venue) as Arc<dyn Venue>)
    })
}
