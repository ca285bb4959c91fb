//! `tokio-tungstenite` implementation of [`WsDialer`].

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::Result;
use crate::port::{WsDialer, WsMessage, WsSink, WsSource};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials real websocket endpoints over TCP, with TLS for `wss://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteDialer;

#[async_trait]
impl WsDialer for TungsteniteDialer {
    async fn dial(&self, url: &str) -> Result<(Box<dyn WsSink>, Box<dyn WsSource>)> {
        let (stream, response) = connect_async(url).await?;
        info!(url = %url, status = %response.status(), "WebSocket connected");
        let (sink, source) = stream.split();
        Ok((Box::new(Sink(sink)), Box::new(Source(source))))
    }
}

struct Sink(SplitSink<Stream, Message>);

#[async_trait]
impl WsSink for Sink {
    async fn send(&mut self, message: WsMessage) -> Result<()> {
        let message = match message {
            WsMessage::Text(text) => Message::Text(text),
            WsMessage::Binary(data) => Message::Binary(data),
            WsMessage::Ping(data) => Message::Ping(data),
            WsMessage::Pong(data) => Message::Pong(data),
            WsMessage::Close => Message::Close(None),
        };
        self.0.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.0.close().await?;
        Ok(())
    }
}

struct Source(SplitStream<Stream>);

#[async_trait]
impl WsSource for Source {
    async fn next(&mut self) -> Option<Result<WsMessage>> {
        loop {
            let message = match self.0.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            let converted = match message {
                Message::Text(text) => WsMessage::Text(text),
                Message::Binary(data) => WsMessage::Binary(data),
                Message::Ping(data) => WsMessage::Ping(data),
                Message::Pong(data) => WsMessage::Pong(data),
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket close frame received");
                    WsMessage::Close
                }
                // Raw frames are never surfaced by the reader.
                Message::Frame(_) => continue,
            };
            return Some(Ok(converted));
        }
    }
}
