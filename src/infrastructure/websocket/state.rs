//! Connection lifecycle state machine.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Dialing,
    Connected,
    Authenticating,
    Authenticated,
    Subscribed,
    /// The link is unusable; the supervisor will redial.
    Degraded,
    /// Shut down. Terminal.
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Dialing => "dialing",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Subscribed => "subscribed",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        }
    }

    /// Whether frames can be written on the link.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Authenticating | Self::Authenticated | Self::Subscribed
        )
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Dialing)
            | (Dialing, Connected | Disconnected | Degraded)
            | (Connected, Authenticating | Subscribed | Degraded)
            | (Authenticating, Authenticated | Degraded)
            | (Authenticated, Subscribed | Degraded)
            | (Subscribed, Degraded)
            | (Degraded, Dialing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Current state plus a watch channel for observers.
#[derive(Debug)]
pub struct StateMachine {
    venue: String,
    current: Mutex<ConnectionState>,
    tx: watch::Sender<ConnectionState>,
}

impl StateMachine {
    #[must_use]
    pub fn new(venue: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            venue: venue.into(),
            current: Mutex::new(ConnectionState::Disconnected),
            tx,
        }
    }

    #[must_use]
    pub fn current(&self) -> ConnectionState {
        *self.current.lock()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Re-entering the current state is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `WsProtocol` for a transition the lifecycle forbids.
    pub fn transition(&self, next: ConnectionState) -> Result<()> {
        let mut current = self.current.lock();
        if *current == next {
            return Ok(());
        }
        if !current.can_transition_to(next) {
            return Err(Error::WsProtocol(format!(
                "{}: invalid transition {} -> {}",
                self.venue, *current, next
            )));
        }
        debug!(venue = %self.venue, from = %*current, to = %next, "Connection state changed");
        *current = next;
        self.tx.send_replace(next);
        Ok(())
    }

    /// Move to `next` only if the machine is in one of `from`.
    pub fn transition_from(&self, from: &[ConnectionState], next: ConnectionState) -> bool {
        let mut current = self.current.lock();
        if !from.contains(&*current) || !current.can_transition_to(next) {
            return false;
        }
        debug!(venue = %self.venue, from = %*current, to = %next, "Connection state changed");
        *current = next;
        self.tx.send_replace(next);
        true
    }
}
