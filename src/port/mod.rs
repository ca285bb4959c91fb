//! Trait definitions (hexagonal ports).
//!
//! # Available Ports
//!
//! - [`Venue`] - the contract every exchange integration implements
//! - [`MarketStore`] - cache facade venues and streams write through
//! - [`HttpTransport`] - swappable HTTP client
//! - [`WsDialer`], [`StreamProtocol`] - websocket socket and venue codec
//! - [`WithdrawStore`] - withdrawal persistence

pub mod outbound;

pub use outbound::market::{BookUpdate, MarketStore};
pub use outbound::store::WithdrawStore;
pub use outbound::stream::{
    Correlation, Outbound, StreamEvent, StreamProtocol, WsDialer, WsMessage, WsSink, WsSource,
};
pub use outbound::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
pub use outbound::venue::{Venue, VenueBase};
