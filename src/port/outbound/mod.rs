//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe what the engine needs from venues, sockets,
//! HTTP clients, the caches and withdrawal storage.

pub mod market;
pub mod store;
pub mod stream;
pub mod transport;
pub mod venue;
