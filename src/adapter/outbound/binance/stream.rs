//! Binance market stream codec.
//!
//! Subscriptions are JSON-RPC style `SUBSCRIBE`/`UNSUBSCRIBE` requests
//! acknowledged by id. Events arrive either bare or wrapped in the combined
//! stream envelope `{"stream":..,"data":{..}}`.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};

use crate::domain::{channel, AssetClass, BookDelta, Level, Pair, Side, Subscription, Ticker, Trade};
use crate::error::{Error, Result};
use crate::infrastructure::websocket::Frame;
use crate::port::{Correlation, Outbound, StreamEvent, StreamProtocol, WsMessage};

/// Upper-case exchange symbol to pair, shared with the REST side.
pub type SymbolMap = Arc<DashMap<String, Pair>>;

pub fn symbol(pair: &Pair) -> String {
    format!("{}{}", pair.base, pair.quote).to_ascii_uppercase()
}

pub struct BinanceProtocol {
    venue: String,
    symbols: SymbolMap,
}

impl BinanceProtocol {
    pub fn new(venue: impl Into<String>, symbols: SymbolMap) -> Self {
        Self {
            venue: venue.into(),
            symbols,
        }
    }

    fn stream_name(&self, subscription: &Subscription) -> Result<String> {
        let pair = subscription.pair.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!("{}: {} needs a pair", self.venue, subscription.channel))
        })?;
        let sym = symbol(pair).to_ascii_lowercase();
        match subscription.channel.as_str() {
            channel::TICKER => Ok(format!("{sym}@ticker")),
            channel::ORDERBOOK => Ok(format!("{sym}@depth@100ms")),
            channel::TRADES => Ok(format!("{sym}@trade")),
            other => Err(Error::unsupported(&self.venue, format!("channel {other}"))),
        }
    }

    fn request(&self, method: &str, subscription: &Subscription, id: i64) -> Result<Outbound> {
        let stream = self.stream_name(subscription)?;
        let body = json!({ "method": method, "params": [stream], "id": id });
        Ok(Outbound::text(method, body.to_string()))
    }

    fn pair(&self, frame: &Frame<'_>) -> Result<Option<Pair>> {
        let sym = frame.string("s")?;
        Ok(self.symbols.get(&sym.to_ascii_uppercase()).map(|p| p.clone()))
    }

    fn ticker(&self, frame: &Frame<'_>, pair: Pair) -> Result<StreamEvent> {
        let mut ticker = Ticker::new(&self.venue, pair, AssetClass::Spot, frame.decimal("c")?);
        ticker.bid = frame.decimal("b")?;
        ticker.ask = frame.decimal("a")?;
        ticker.high = frame.decimal("h")?;
        ticker.low = frame.decimal("l")?;
        ticker.open = frame.decimal("o")?;
        ticker.close = ticker.last;
        ticker.volume = frame.decimal("v")?;
        ticker.quote_volume = frame.decimal("q")?;
        ticker.last_updated = frame.field("E")?.as_millis()?;
        Ok(StreamEvent::Ticker(ticker))
    }

    fn depth(frame: &Frame<'_>, pair: Pair) -> Result<StreamEvent> {
        let levels = |key: &str| -> Result<Vec<Level>> {
            frame
                .field(key)?
                .items()?
                .iter()
                .map(|level| {
                    let parts = level.items()?;
                    match parts.as_slice() {
                        [price, amount, ..] => {
                            Ok(Level::new(price.as_decimal()?, amount.as_decimal()?))
                        }
                        _ => Err(Error::Decode(format!("bad depth level {}", level.value()))),
                    }
                })
                .collect()
        };
        let final_id = frame.field("u")?.as_i64()?;
        let sequence = u64::try_from(final_id)
            .map_err(|_| Error::Decode(format!("negative depth update id {final_id}")))?;
        let mut delta = BookDelta::new(levels("b")?, levels("a")?).with_sequence(sequence);
        delta.timestamp = frame.field("E")?.as_millis()?;
        Ok(StreamEvent::BookDelta {
            pair,
            asset: AssetClass::Spot,
            delta,
        })
    }

    fn trade(&self, frame: &Frame<'_>, pair: Pair) -> Result<StreamEvent> {
        let mut trade = Trade::new(
            frame.field("t")?.as_i64()?.to_string(),
            frame.field("T")?.as_millis()?,
            frame.decimal("p")?,
            frame.decimal("q")?,
        );
        trade.venue = self.venue.clone();
        trade.pair = pair;
        // `m` is true when the buyer was the maker, so the taker sold.
        let buyer_maker = frame.get("m").and_then(|m| m.value().as_bool()).unwrap_or(false);
        trade.side = if buyer_maker { Side::Sell } else { Side::Buy };
        Ok(StreamEvent::Trade(trade))
    }

    fn event(&self, frame: &Frame<'_>, kind: &str) -> Result<StreamEvent> {
        let Some(pair) = self.pair(frame)? else {
            return Ok(StreamEvent::Unhandled(format!(
                "{kind} for unknown symbol: {}",
                frame.value()
            )));
        };
        match kind {
            "24hrTicker" => self.ticker(frame, pair),
            "depthUpdate" => Self::depth(frame, pair),
            "trade" => self.trade(frame, pair),
            _ => Ok(StreamEvent::Unhandled(format!("event {kind}: {}", frame.value()))),
        }
    }
}

impl StreamProtocol for BinanceProtocol {
    fn correlation(&self) -> Correlation {
        Correlation::ById
    }

    fn subscribe(&self, subscription: &Subscription, id: i64) -> Result<Outbound> {
        self.request("SUBSCRIBE", subscription, id)
    }

    fn unsubscribe(&self, subscription: &Subscription, id: i64) -> Result<Outbound> {
        self.request("UNSUBSCRIBE", subscription, id)
    }

    fn decode(&self, message: &WsMessage) -> Result<Vec<StreamEvent>> {
        let Some(text) = message.as_text() else {
            return Ok(Vec::new());
        };
        let value = Frame::parse(&text)?;
        let frame = Frame::new(&value);

        if let Some(id) = frame.get("id") {
            // A successful ack carries `"result": null`.
            if value.get("result").is_some() || frame.get("error").is_some() {
                let error = frame.get("error").map(|e| {
                    e.get("msg")
                        .and_then(|m| m.value().as_str().map(str::to_string))
                        .unwrap_or_else(|| e.value().to_string())
                });
                return Ok(vec![StreamEvent::Response {
                    id: id.value().as_i64(),
                    method: None,
                    payload: frame.get("result").map_or(Value::Null, |r| r.value().clone()),
                    error,
                }]);
            }
        }

        let data = frame.get("data").unwrap_or_else(|| frame.clone());
        match data.get("e") {
            Some(kind) => Ok(vec![self.event(&data, kind.as_str()?)?]),
            None => Ok(vec![StreamEvent::Unhandled(text.into_owned())]),
        }
    }
}
