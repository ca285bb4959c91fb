//! Websocket connection core shared by every venue.

mod backoff;
mod correlation;
pub mod frame;
mod ledger;
mod manager;
mod router;
mod state;

pub use backoff::Backoff;
pub use correlation::{Correlator, DEFAULT_MAX_OUTSTANDING};
pub use frame::Frame;
pub use ledger::SubscriptionLedger;
pub use manager::{WebsocketManager, WsSettings};
pub use router::{Diagnostic, ResyncRequest, Router, StreamStats, StreamStatsSnapshot};
pub use state::{ConnectionState, StateMachine};
