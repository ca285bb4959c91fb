//! One logical websocket connection per venue.
//!
//! The manager owns the socket, the lifecycle state, the subscription ledger
//! and request correlation. A reader and a writer task serve each physical
//! connection; a supervisor redials with backoff whenever the link degrades
//! and replays the ledger; a monitor pings, enforces the traffic timeout and
//! expires correlated requests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::correlation::{Correlator, DEFAULT_MAX_OUTSTANDING};
use super::frame::{truncate, MAX_QUOTED};
use super::ledger::SubscriptionLedger;
use super::router::{Diagnostic, ResyncRequest, Router, StreamStats, StreamStatsSnapshot};
use super::state::{ConnectionState, StateMachine};
use crate::domain::{Credentials, Subscription, Trade};
use crate::error::{Error, Result};
use crate::infrastructure::config::{ReconnectionConfig, StreamConfig, VenueConfig};
use crate::port::{
    Correlation, MarketStore, Outbound, StreamEvent, StreamProtocol, WsDialer, WsMessage, WsSink,
    WsSource,
};

/// Outbound frames queued ahead of the writer.
const OUTBOUND_QUEUE: usize = 1024;

const LIVE: [ConnectionState; 4] = [
    ConnectionState::Connected,
    ConnectionState::Authenticating,
    ConnectionState::Authenticated,
    ConnectionState::Subscribed,
];

/// Connection settings resolved from venue and process config.
#[derive(Debug, Clone)]
pub struct WsSettings {
    pub url: String,
    /// Log in after dialing, before replaying subscriptions.
    pub authenticate: bool,
    pub ping_interval: Duration,
    /// Silence after which the link is considered dead.
    pub traffic_timeout: Duration,
    /// Deadline for a correlated response.
    pub response_timeout: Duration,
    /// How often expired requests are swept.
    pub response_check_interval: Duration,
    pub max_outstanding: usize,
    pub max_decode_failures: u32,
    pub channel_capacity: usize,
    pub shutdown_grace: Duration,
    pub reconnection: ReconnectionConfig,
}

impl WsSettings {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(url, &VenueConfig::named(""), &StreamConfig::default())
    }

    #[must_use]
    pub fn from_config(url: impl Into<String>, venue: &VenueConfig, stream: &StreamConfig) -> Self {
        Self {
            url: url.into(),
            authenticate: venue.api.authenticated_websocket_support,
            ping_interval: stream.ping_interval(),
            traffic_timeout: venue.websocket_traffic_timeout,
            response_timeout: venue.websocket_response_max_limit,
            response_check_interval: venue.websocket_response_check_timeout,
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
            max_decode_failures: stream.max_decode_failures.max(1),
            channel_capacity: stream.channel_capacity,
            shutdown_grace: stream.shutdown_grace(),
            reconnection: stream.reconnection.clone(),
        }
    }
}

struct Inner {
    venue: String,
    settings: WsSettings,
    protocol: Arc<dyn StreamProtocol>,
    dialer: Arc<dyn WsDialer>,
    credentials: RwLock<Option<Credentials>>,
    state: StateMachine,
    ledger: SubscriptionLedger,
    correlator: Correlator,
    router: Router,
    stats: Arc<StreamStats>,
    resync: Mutex<Option<mpsc::Receiver<ResyncRequest>>>,
    writer: Mutex<Option<mpsc::Sender<WsMessage>>>,
    generation: AtomicU64,
    /// Monotonic time of the last inbound frame.
    last_traffic: Mutex<Instant>,
    decode_failures: AtomicU32,
    /// Serializes dialing with subscription changes.
    op_lock: tokio::sync::Mutex<()>,
    degraded: Notify,
    shutdown: watch::Sender<bool>,
    background: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn touch(&self) {
        *self.last_traffic.lock() = Instant::now();
    }

    fn silence(&self) -> Duration {
        self.last_traffic.lock().elapsed()
    }
}

/// Handle to a venue's websocket connection. Clones share the connection.
#[derive(Clone)]
pub struct WebsocketManager {
    inner: Arc<Inner>,
}

impl WebsocketManager {
    #[must_use]
    pub fn new(
        venue: impl Into<String>,
        settings: WsSettings,
        protocol: Arc<dyn StreamProtocol>,
        dialer: Arc<dyn WsDialer>,
        store: Arc<dyn MarketStore>,
    ) -> Self {
        let venue = venue.into();
        let stats = Arc::new(StreamStats::default());
        let (router, resync) = Router::new(
            venue.clone(),
            store,
            settings.channel_capacity,
            Arc::clone(&stats),
        );
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: StateMachine::new(venue.clone()),
                correlator: Correlator::new(venue.clone(), settings.max_outstanding),
                venue,
                settings,
                protocol,
                dialer,
                credentials: RwLock::new(None),
                ledger: SubscriptionLedger::new(),
                router,
                stats,
                resync: Mutex::new(Some(resync)),
                writer: Mutex::new(None),
                generation: AtomicU64::new(0),
                last_traffic: Mutex::new(Instant::now()),
                decode_failures: AtomicU32::new(0),
                op_lock: tokio::sync::Mutex::new(()),
                degraded: Notify::new(),
                shutdown,
                background: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn venue(&self) -> &str {
        &self.inner.venue
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.inner.credentials.write() = credentials;
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.watch()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Confirmed subscriptions, in the order they will be replayed.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.ledger.snapshot()
    }

    pub fn stats(&self) -> StreamStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn outstanding_requests(&self) -> usize {
        self.inner.correlator.outstanding()
    }

    pub fn trades(&self) -> broadcast::Receiver<Trade> {
        self.inner.router.trades()
    }

    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.inner.router.diagnostics()
    }

    /// Orderbook resync requests. Can be taken once.
    pub fn take_resync_requests(&self) -> Option<mpsc::Receiver<ResyncRequest>> {
        self.inner.resync.lock().take()
    }

    /// Dial, log in if configured, replay the ledger, then keep the link up.
    ///
    /// # Errors
    ///
    /// Returns `WsClosed` after shutdown, or the first dial or handshake error.
    pub async fn connect(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Closed => return Err(Error::WsClosed),
            state if state.is_open() => return Ok(()),
            _ => {}
        }
        self.establish().await?;
        self.spawn_background();
        Ok(())
    }

    /// Subscribe, skipping entries already in the ledger.
    ///
    /// With correlation, an entry joins the ledger only once the venue
    /// confirms it. While the link is down, entries are recorded and sent
    /// on the next connect.
    ///
    /// # Errors
    ///
    /// Returns the first per-subscription failure after attempting all.
    pub async fn subscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Err(Error::WsClosed);
        }
        let _op = self.inner.op_lock.lock().await;

        if !self.state().is_open() {
            for subscription in subscriptions {
                if self.inner.ledger.add(subscription.clone()) {
                    debug!(venue = %self.inner.venue, subscription = %subscription, "Queued until connected");
                }
            }
            return Ok(());
        }

        let mut first_error = None;
        for subscription in subscriptions {
            if self.inner.ledger.contains(subscription) {
                debug!(venue = %self.inner.venue, subscription = %subscription, "Already subscribed");
                continue;
            }
            let id = self.inner.correlator.next_id();
            let result = match self.inner.protocol.subscribe(subscription, id) {
                Ok(outbound) => self.exchange(id, outbound).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(_) => {
                    self.inner.ledger.add(subscription.clone());
                }
                Err(e) => {
                    warn!(venue = %self.inner.venue, subscription = %subscription, error = %e, "Subscribe failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// # Errors
    ///
    /// Returns the first per-subscription failure after attempting all.
    pub async fn unsubscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Err(Error::WsClosed);
        }
        let _op = self.inner.op_lock.lock().await;

        let mut first_error = None;
        for subscription in subscriptions {
            if !self.inner.ledger.contains(subscription) {
                continue;
            }
            if !self.state().is_open() {
                self.inner.ledger.remove(subscription);
                continue;
            }
            let id = self.inner.correlator.next_id();
            let result = match self.inner.protocol.unsubscribe(subscription, id) {
                Ok(outbound) => self.exchange(id, outbound).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(_) => {
                    self.inner.ledger.remove(subscription);
                }
                Err(e) => {
                    warn!(venue = %self.inner.venue, subscription = %subscription, error = %e, "Unsubscribe failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Send a request built around a fresh message id and wait for its reply.
    ///
    /// # Errors
    ///
    /// - `WsClosed` when the link is down
    /// - `WsTimeout` when no reply arrives in time
    /// - `Venue` when the venue rejects the request
    pub async fn request<F>(&self, build: F) -> Result<Value>
    where
        F: FnOnce(i64) -> Result<Outbound> + Send,
    {
        if !self.state().is_open() {
            return Err(Error::WsClosed);
        }
        let id = self.inner.correlator.next_id();
        let outbound = build(id)?;
        self.exchange(id, outbound).await
    }

    /// Close the link, fail waiting requests with `WsClosed` and stop every
    /// task within the grace period.
    ///
    /// # Errors
    ///
    /// Never fails once the manager is open; kept fallible for callers.
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.state.current() == ConnectionState::Closed {
            return Ok(());
        }
        inner.shutdown.send_replace(true);
        inner.state.transition(ConnectionState::Closed)?;
        inner.writer.lock().take();
        let drained = inner.correlator.drain();

        let mut tasks = std::mem::take(&mut *inner.tasks.lock());
        let joined =
            tokio::time::timeout(inner.settings.shutdown_grace, join_all(tasks.iter_mut())).await;
        if joined.is_err() {
            warn!(venue = %inner.venue, "Websocket tasks still running after grace period, aborting");
            for task in &tasks {
                task.abort();
            }
        }
        info!(venue = %inner.venue, drained, "Websocket shut down");
        Ok(())
    }

    async fn establish(&self) -> Result<()> {
        let inner = &self.inner;
        let _op = inner.op_lock.lock().await;
        inner.state.transition(ConnectionState::Dialing)?;

        let dial = inner.dialer.dial(&inner.settings.url);
        let dialed = tokio::time::timeout(inner.settings.traffic_timeout, dial).await;
        let (sink, source) = match dialed {
            Ok(Ok(halves)) => halves,
            Ok(Err(e)) => {
                inner.state.transition(ConnectionState::Disconnected)?;
                return Err(e);
            }
            Err(_) => {
                inner.state.transition(ConnectionState::Disconnected)?;
                return Err(Error::Connection(format!(
                    "{}: dial timed out after {:?}",
                    inner.venue, inner.settings.traffic_timeout
                )));
            }
        };

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.decode_failures.store(0, Ordering::Relaxed);
        inner.touch();
        inner.state.transition(ConnectionState::Connected)?;

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        *inner.writer.lock() = Some(tx);
        let writer = tokio::spawn(self.clone().write_loop(generation, sink, rx));
        let reader = tokio::spawn(self.clone().read_loop(generation, source));
        {
            let mut tasks = inner.tasks.lock();
            tasks.retain(|t| !t.is_finished());
            tasks.extend([writer, reader]);
        }
        info!(venue = %inner.venue, url = %inner.settings.url, generation, "Websocket connected");

        if let Err(e) = self.handshake().await {
            self.degrade(generation, &format!("handshake failed: {e}"));
            return Err(e);
        }
        inner.state.transition(ConnectionState::Subscribed)?;
        Ok(())
    }

    /// Log in if configured, then replay each ledger entry once, in order.
    async fn handshake(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.settings.authenticate {
            let credentials = inner.credentials.read().clone();
            match credentials {
                Some(credentials) if credentials.is_present() => {
                    let id = inner.correlator.next_id();
                    if let Some(outbound) = inner.protocol.authenticate(&credentials, id)? {
                        inner.state.transition(ConnectionState::Authenticating)?;
                        self.exchange(id, outbound).await.map_err(|e| match e {
                            Error::Venue { message, .. } => Error::AuthRejected {
                                venue: inner.venue.clone(),
                                reason: message,
                            },
                            other => other,
                        })?;
                        inner.state.transition(ConnectionState::Authenticated)?;
                        info!(venue = %inner.venue, "Websocket authenticated");
                    }
                }
                _ => warn!(venue = %inner.venue, "Authenticated websocket configured without credentials"),
            }
        }

        let replay = inner.ledger.snapshot();
        if !replay.is_empty() {
            debug!(venue = %inner.venue, count = replay.len(), "Replaying subscriptions");
        }
        for subscription in replay {
            let id = inner.correlator.next_id();
            let outbound = inner.protocol.subscribe(&subscription, id)?;
            match self.exchange(id, outbound).await {
                Ok(_) => {}
                Err(e @ Error::Venue { .. }) => {
                    warn!(venue = %inner.venue, subscription = %subscription, error = %e, "Replay rejected, dropping subscription");
                    inner.ledger.remove(&subscription);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn exchange(&self, id: i64, outbound: Outbound) -> Result<Value> {
        let inner = &self.inner;
        if inner.protocol.correlation() == Correlation::None {
            self.send(outbound.message).await?;
            return Ok(Value::Null);
        }

        let timeout = inner.settings.response_timeout;
        let reply = inner
            .correlator
            .register(id, &outbound.method, Instant::now() + timeout)?;
        if let Err(e) = self.send(outbound.message).await {
            inner.correlator.cancel(id);
            return Err(e);
        }

        // The monitor sweeps expired waiters; this bound covers a stopped monitor.
        match tokio::time::timeout(timeout + inner.settings.response_check_interval, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::WsClosed),
            Err(_) => {
                inner.correlator.cancel(id);
                Err(Error::WsTimeout {
                    request: format!("{}#{id}", outbound.method),
                })
            }
        }
    }

    async fn send(&self, message: WsMessage) -> Result<()> {
        let tx = self.inner.writer.lock().clone().ok_or(Error::WsClosed)?;
        tx.send(message).await.map_err(|_| Error::WsClosed)
    }

    fn try_send(&self, message: WsMessage) {
        if let Some(tx) = self.inner.writer.lock().as_ref() {
            let _ = tx.try_send(message);
        }
    }

    /// Mark the link unusable and wake the supervisor. Ignored for stale
    /// connections and when the link is not live.
    fn degrade(&self, generation: u64, reason: &str) {
        let inner = &self.inner;
        if inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if !inner.state.transition_from(&LIVE, ConnectionState::Degraded) {
            return;
        }
        warn!(venue = %inner.venue, reason, "Websocket degraded");
        inner.writer.lock().take();
        inner.correlator.drain();
        inner.router.diagnose(format!("connection degraded: {reason}"));
        inner.degraded.notify_one();
    }

    fn spawn_background(&self) {
        if self.inner.background.swap(true, Ordering::SeqCst) {
            return;
        }
        let supervisor = tokio::spawn(self.clone().supervise());
        let monitor = tokio::spawn(self.clone().monitor());
        self.inner.tasks.lock().extend([supervisor, monitor]);
    }

    async fn read_loop(self, generation: u64, mut source: Box<dyn WsSource>) {
        let mut shutdown = self.inner.shutdown.subscribe();
        loop {
            if *shutdown.borrow() {
                break;
            }
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = source.next() => next,
            };
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            match next {
                None => {
                    self.degrade(generation, "peer closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    self.degrade(generation, &e.to_string());
                    break;
                }
                Some(Ok(message)) => {
                    if !self.handle_message(generation, message) {
                        break;
                    }
                }
            }
        }
        debug!(venue = %self.inner.venue, generation, "Reader stopped");
    }

    /// Returns false when the connection must stop reading.
    fn handle_message(&self, generation: u64, message: WsMessage) -> bool {
        let inner = &self.inner;
        inner.touch();
        inner.stats.messages.fetch_add(1, Ordering::Relaxed);

        match &message {
            WsMessage::Ping(payload) => {
                self.try_send(WsMessage::Pong(payload.clone()));
                return true;
            }
            WsMessage::Pong(_) => return true,
            WsMessage::Close => {
                self.degrade(generation, "peer sent close");
                return false;
            }
            WsMessage::Text(_) | WsMessage::Binary(_) => {}
        }

        match inner.protocol.decode(&message) {
            Ok(events) => {
                inner.decode_failures.store(0, Ordering::Relaxed);
                for event in events {
                    self.dispatch(event);
                }
                true
            }
            Err(e) => {
                inner.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                let failures = inner.decode_failures.fetch_add(1, Ordering::Relaxed) + 1;
                let raw = message
                    .as_text()
                    .map(|text| truncate(&text, MAX_QUOTED).to_string())
                    .unwrap_or_default();
                warn!(venue = %inner.venue, error = %e, failures, payload = %raw, "Failed to decode frame");
                inner.router.diagnose(format!("decode failure: {e}"));
                if failures >= inner.settings.max_decode_failures {
                    self.degrade(generation, "too many consecutive decode failures");
                    return false;
                }
                true
            }
        }
    }

    fn dispatch(&self, event: StreamEvent) {
        match event {
            StreamEvent::Response {
                id,
                method,
                payload,
                error,
            } => {
                let result = match error {
                    Some(message) => Err(Error::Venue {
                        venue: self.inner.venue.clone(),
                        code: "websocket".to_string(),
                        message,
                    }),
                    None => Ok(payload),
                };
                self.inner.correlator.resolve(id, method.as_deref(), result);
            }
            other => self.inner.router.route(other),
        }
    }

    async fn write_loop(
        self,
        generation: u64,
        mut sink: Box<dyn WsSink>,
        mut rx: mpsc::Receiver<WsMessage>,
    ) {
        let mut shutdown = self.inner.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                message = rx.recv() => match message {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            self.degrade(generation, &format!("write failed: {e}"));
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        if let Err(e) = sink.close().await {
            debug!(venue = %self.inner.venue, error = %e, "Close failed");
        }
    }

    async fn supervise(self) {
        let mut shutdown = self.inner.shutdown.subscribe();
        let mut backoff = Backoff::new(self.inner.settings.reconnection.clone());
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                () = self.inner.degraded.notified() => {}
            }
            loop {
                let state = self.state();
                if state == ConnectionState::Closed {
                    return;
                }
                if state.is_open() {
                    break;
                }
                let delay = backoff.next_delay();
                info!(
                    venue = %self.inner.venue,
                    delay_ms = delay.as_millis() as u64,
                    attempt = backoff.consecutive_failures() + 1,
                    "Reconnecting after delay"
                );
                tokio::select! {
                    _ = shutdown.changed() => return,
                    () = tokio::time::sleep(delay) => {}
                }
                self.inner.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                match self.establish().await {
                    Ok(()) => {
                        info!(venue = %self.inner.venue, "Websocket re-established");
                        backoff.reset();
                        break;
                    }
                    Err(e) => {
                        error!(venue = %self.inner.venue, error = %e, "Reconnection failed");
                        backoff.record_failure();
                    }
                }
            }
        }
    }

    async fn monitor(self) {
        let inner = &self.inner;
        let mut shutdown = inner.shutdown.subscribe();
        let period = inner
            .settings
            .response_check_interval
            .max(Duration::from_millis(1));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_ping = Instant::now();
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tick.tick() => {}
            }
            let now = Instant::now();
            inner.correlator.expire(now);
            if !self.state().is_open() {
                continue;
            }
            let generation = inner.generation.load(Ordering::SeqCst);
            if inner.silence() > inner.settings.traffic_timeout {
                self.degrade(generation, "no traffic within timeout");
                continue;
            }
            if now.duration_since(last_ping) >= inner.settings.ping_interval {
                last_ping = now;
                if let Some(ping) = inner.protocol.ping() {
                    self.try_send(ping);
                }
            }
        }
    }
}

impl std::fmt::Debug for WebsocketManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebsocketManager")
            .field("venue", &self.inner.venue)
            .field("state", &self.state())
            .field("subscriptions", &self.inner.ledger.len())
            .finish_non_exhaustive()
    }
}
