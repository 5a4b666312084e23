//! WebSocket transport split into an outbound sender and an inbound pump.
//!
//! The transport layer moves raw JSON values; it knows nothing about
//! request ids or CDP methods. [`crate::connection::Connection`] builds
//! the correlation layer on top of [`TransportParts`], which also makes
//! it possible to swap in an in-memory transport for tests.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a transport.
pub trait Transport: Send {
    fn send(
        &mut self,
        message: Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Inbound half of a transport. `run` pumps messages until the peer
/// closes, forwarding each parsed frame to the connection's channel.
pub trait TransportReceiver: Send {
    fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Everything a [`crate::connection::Connection`] needs to operate.
pub struct TransportParts {
    pub sender: Box<dyn Transport>,
    pub receiver: Box<dyn TransportReceiver>,
    pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Connects to a WebSocket endpoint and wires up both halves.
pub async fn connect(url: &str) -> Result<TransportParts> {
    let (stream, _) = connect_async(url).await?;
    debug!(target = "jb", %url, "websocket transport connected");

    let (sink, source) = stream.split();
    let (message_tx, message_rx) = mpsc::unbounded_channel();

    Ok(TransportParts {
        sender: Box::new(WsTransportSender { sink }),
        receiver: Box::new(WsTransportReceiver { source, message_tx }),
        message_rx,
    })
}

struct WsTransportSender {
    sink: SplitSink<WsStream, Message>,
}

impl Transport for WsTransportSender {
    fn send(
        &mut self,
        message: Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let text = serde_json::to_string(&message)?;
            self.sink.send(Message::text(text)).await?;
            Ok(())
        })
    }
}

struct WsTransportReceiver {
    source: SplitStream<WsStream>,
    message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WsTransportReceiver {
    fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        Box::pin(async move {
            while let Some(frame) = self.source.next().await {
                let message = match frame? {
                    Message::Text(text) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(target = "jb", error = %err, "dropping unparseable frame");
                            continue;
                        }
                    },
                    Message::Close(_) => break,
                    // CDP endpoints only speak text frames; ping/pong is
                    // handled by tungstenite itself.
                    _ => continue,
                };

                if self.message_tx.send(message).is_err() {
                    break;
                }
            }
            Ok(())
        })
    }
}
