//! In-process websocket plumbing for tests.
//!
//! - [`ChannelDialer`] - A [`WsDialer`] whose connections are channel pairs.
//!   Each dial queues a [`ServerEnd`] the test picks up with `accept()`.
//! - [`ServerEnd`] - The venue side of one connection: read requests,
//!   answer them, push frames, or drop the link.
//! - [`MockProtocol`] - A small JSON codec with a login request and a
//!   ticker, book and trade channel, used wherever a test needs a venue
//!   protocol.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::domain::{
    AssetClass, BookDelta, Credentials, Level, Orderbook, Pair, Side, Subscription, Ticker, Trade,
};
use crate::error::{Error, Result};
use crate::infrastructure::websocket::Frame;
use crate::port::{
    Correlation, Outbound, StreamEvent, StreamProtocol, WsDialer, WsMessage, WsSink, WsSource,
};

// ---------------------------------------------------------------------------
// ChannelDialer
// ---------------------------------------------------------------------------

/// Dials succeed immediately; the matching [`ServerEnd`] waits in a queue.
pub struct ChannelDialer {
    tx: mpsc::UnboundedSender<ServerEnd>,
    rx: Mutex<mpsc::UnboundedReceiver<ServerEnd>>,
    refuse: std::sync::atomic::AtomicU32,
}

impl ChannelDialer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            refuse: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Fail the next `count` dials with a connection error.
    pub fn refuse_next(&self, count: u32) {
        self.refuse
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }

    /// The next connection the client opened, waiting up to five seconds.
    pub async fn accept(&self) -> Option<ServerEnd> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Default for ChannelDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WsDialer for ChannelDialer {
    async fn dial(&self, url: &str) -> Result<(Box<dyn WsSink>, Box<dyn WsSource>)> {
        let refused = self
            .refuse
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| n.checked_sub(1),
            )
            .is_ok();
        if refused {
            return Err(Error::Connection(format!("refused: {url}")));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let server = ServerEnd {
            to_client: Some(to_client),
            from_client,
        };
        self.tx
            .send(server)
            .map_err(|_| Error::Connection("dialer dropped".into()))?;
        Ok((
            Box::new(ClientSink(Some(client_tx))),
            Box::new(ClientSource(client_rx)),
        ))
    }
}

struct ClientSink(Option<mpsc::UnboundedSender<WsMessage>>);

#[async_trait]
impl WsSink for ClientSink {
    async fn send(&mut self, message: WsMessage) -> Result<()> {
        let tx = self.0.as_ref().ok_or(Error::WsClosed)?;
        tx.send(message).map_err(|_| Error::WsClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.0.take();
        Ok(())
    }
}

struct ClientSource(mpsc::UnboundedReceiver<WsMessage>);

#[async_trait]
impl WsSource for ClientSource {
    async fn next(&mut self) -> Option<Result<WsMessage>> {
        self.0.recv().await.map(Ok)
    }
}

// ---------------------------------------------------------------------------
// ServerEnd
// ---------------------------------------------------------------------------

/// The venue side of one test connection.
pub struct ServerEnd {
    to_client: Option<mpsc::UnboundedSender<WsMessage>>,
    from_client: mpsc::UnboundedReceiver<WsMessage>,
}

impl ServerEnd {
    /// Next JSON text frame from the client. Pings and other control frames
    /// are skipped. `None` once the client hung up or after five seconds.
    pub async fn next_request(&mut self) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            let message = tokio::time::timeout_at(deadline, self.from_client.recv())
                .await
                .ok()??;
            if let WsMessage::Text(text) = message {
                return serde_json::from_str(&text).ok();
            }
        }
    }

    /// A request already waiting, if any.
    pub fn try_next_request(&mut self) -> Option<Value> {
        while let Ok(message) = self.from_client.try_recv() {
            if let WsMessage::Text(text) = message {
                return serde_json::from_str(&text).ok();
            }
        }
        None
    }

    pub fn send_text(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(WsMessage::Text(text.to_string()));
        }
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    /// Acknowledge request `id`.
    pub fn reply(&self, id: i64) {
        self.send_json(&json!({ "id": id, "result": null }));
    }

    pub fn reject(&self, id: i64, message: &str) {
        self.send_json(&json!({ "id": id, "error": message }));
    }

    /// Drop the link; the client sees the stream end.
    pub fn close(&mut self) {
        self.to_client.take();
    }
}

// ---------------------------------------------------------------------------
// MockProtocol
// ---------------------------------------------------------------------------

/// JSON codec for the `mock` venue.
///
/// Requests: `{"id", "method", "channel", "base", "quote"}`.
/// Frames:
/// - `{"channel":"ticker","base","quote","last"}`
/// - `{"channel":"book","base","quote","seq","snapshot":bool,"bids":[[p,a]],"asks":[[p,a]]}`
/// - `{"channel":"trade","base","quote","id","price","amount","side"}`
/// - `{"id", "result"}` or `{"id", "error"}` replies
pub struct MockProtocol {
    venue: String,
    correlation: Correlation,
}

impl MockProtocol {
    pub fn new(venue: impl Into<String>, correlation: Correlation) -> Self {
        Self {
            venue: venue.into(),
            correlation,
        }
    }

    pub fn shared(venue: impl Into<String>, correlation: Correlation) -> Arc<dyn StreamProtocol> {
        Arc::new(Self::new(venue, correlation))
    }

    fn encode(method: &str, subscription: &Subscription, id: i64) -> Outbound {
        let (base, quote) = subscription
            .pair
            .as_ref()
            .map(|p| (p.base.to_string(), p.quote.to_string()))
            .unwrap_or_default();
        let body = json!({
            "id": id,
            "method": method,
            "channel": subscription.channel,
            "base": base,
            "quote": quote,
        });
        Outbound::text(method, body.to_string())
    }

    fn levels(frame: &Frame<'_>, key: &str) -> Result<Vec<Level>> {
        let Some(side) = frame.get(key) else {
            return Ok(Vec::new());
        };
        side.items()?
            .iter()
            .map(|level| {
                let parts = level.items()?;
                match parts.as_slice() {
                    [price, amount] => Ok(Level::new(price.as_decimal()?, amount.as_decimal()?)),
                    _ => Err(Error::Decode(format!("bad level {}", level.value()))),
                }
            })
            .collect()
    }
}

impl StreamProtocol for MockProtocol {
    fn correlation(&self) -> Correlation {
        self.correlation
    }

    fn subscribe(&self, subscription: &Subscription, id: i64) -> Result<Outbound> {
        Ok(Self::encode("subscribe", subscription, id))
    }

    fn unsubscribe(&self, subscription: &Subscription, id: i64) -> Result<Outbound> {
        Ok(Self::encode("unsubscribe", subscription, id))
    }

    fn authenticate(&self, credentials: &Credentials, id: i64) -> Result<Option<Outbound>> {
        let body = json!({ "id": id, "method": "auth", "key": credentials.key });
        Ok(Some(Outbound::text("auth", body.to_string())))
    }

    fn decode(&self, message: &WsMessage) -> Result<Vec<StreamEvent>> {
        let Some(text) = message.as_text() else {
            return Ok(Vec::new());
        };
        let value = Frame::parse(&text)?;
        let frame = Frame::new(&value);

        if value.get("result").is_some() || frame.get("error").is_some() {
            return Ok(vec![StreamEvent::Response {
                id: frame.get("id").and_then(|id| id.as_i64().ok()),
                method: frame.get("method").and_then(|m| m.as_str().ok()).map(str::to_string),
                payload: value.get("result").cloned().unwrap_or(Value::Null),
                error: frame.get("error").map(|e| match e.value() {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            }]);
        }

        let Some(channel) = frame.get("channel") else {
            return Ok(vec![StreamEvent::Unhandled(text.into_owned())]);
        };
        let pair = || Pair::new(frame.string("base")?, frame.string("quote")?);
        let event = match channel.as_str()? {
            "ticker" => {
                let mut ticker =
                    Ticker::new(&self.venue, pair()?, AssetClass::Spot, frame.decimal("last")?);
                ticker.bid = frame.get("bid").map_or(Ok(ticker.last), |v| v.as_decimal())?;
                ticker.ask = frame.get("ask").map_or(Ok(ticker.last), |v| v.as_decimal())?;
                ticker.last_updated = Utc::now();
                StreamEvent::Ticker(ticker)
            }
            "book" => {
                let sequence = frame
                    .get("seq")
                    .map(|s| s.as_i64())
                    .transpose()?
                    .and_then(|s| u64::try_from(s).ok());
                let bids = Self::levels(&frame, "bids")?;
                let asks = Self::levels(&frame, "asks")?;
                let snapshot = frame
                    .get("snapshot")
                    .and_then(|s| s.value().as_bool())
                    .unwrap_or(false);
                if snapshot {
                    let mut book =
                        Orderbook::with_levels(&self.venue, pair()?, AssetClass::Spot, bids, asks);
                    book.sequence = sequence;
                    StreamEvent::BookSnapshot(book)
                } else {
                    let mut delta = BookDelta::new(bids, asks);
                    delta.sequence = sequence;
                    StreamEvent::BookDelta {
                        pair: pair()?,
                        asset: AssetClass::Spot,
                        delta,
                    }
                }
            }
            "trade" => {
                let mut trade = Trade::new(
                    frame.string("id")?,
                    Utc::now(),
                    frame.decimal("price")?,
                    frame.decimal("amount")?,
                );
                trade.venue = self.venue.clone();
                trade.pair = pair()?;
                trade.side = frame
                    .get("side")
                    .and_then(|s| s.as_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(Side::Unknown);
                StreamEvent::Trade(trade)
            }
            other => StreamEvent::Unhandled(format!("channel {other}")),
        };
        Ok(vec![event])
    }
}
