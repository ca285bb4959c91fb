//! Outbound adapters (driven side).
//!
//! Network transports, venue integrations and in-process stores.

pub mod binance;
pub mod http;
pub mod memory;
pub mod websocket;

pub use http::ReqwestTransport;
pub use memory::MemoryWithdrawStore;
pub use websocket::TungsteniteDialer;
