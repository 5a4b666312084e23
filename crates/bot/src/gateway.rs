//! The chat gateway: a WebSocket endpoint the chat bridge connects to,
//! plus the manual-entry HTTP route.
//!
//! The bridge (whatever speaks to the actual chat service) delivers
//! inbound `{sender, text, channel}` frames and receives outbound
//! `{channel, text}` frames. The gateway itself never manages chat
//! connections or auth; it only routes frames.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use jb_driver::BrowserDriver;
use jukebox::chat::{ChannelId, ChatEvent, ChatHandler, ChatTransport};
use jukebox::queue::JobQueue;
use jukebox::session::SessionController;
use jukebox::types::PlaybackRequest;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

/// Frame delivered by the chat bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Message {
        sender: String,
        text: String,
        channel: ChannelId,
    },
}

/// Frame sent back to the chat bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Message { channel: ChannelId, text: String },
}

type PeerMap = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<OutboundFrame>>>>;

/// Outbound chat transport over the connected bridge sockets.
#[derive(Clone)]
pub struct WsTransport {
    peers: PeerMap,
}

#[async_trait]
impl ChatTransport for WsTransport {
    async fn send(&self, channel: &ChannelId, text: &str) -> jukebox::Result<()> {
        let frame = OutboundFrame::Message {
            channel: channel.clone(),
            text: text.to_string(),
        };

        let peers = self.peers.lock();
        if peers.is_empty() {
            return Err(jukebox::Error::ChatSend("no chat bridge connected".to_string()));
        }
        for tx in peers.values() {
            let _ = tx.send(frame.clone());
        }
        Ok(())
    }
}

pub struct Gateway<D: BrowserDriver> {
    handler: Arc<ChatHandler<D, WsTransport>>,
    queue: JobQueue,
    peers: PeerMap,
    next_peer: AtomicU64,
}

impl<D: BrowserDriver + 'static> Gateway<D> {
    /// Builds the gateway and the chat handler it feeds. The handler is
    /// returned separately so the orchestrator can use it as its
    /// notifier.
    pub fn new(
        session: Arc<SessionController<D>>,
        queue: JobQueue,
        announce_channel: ChannelId,
    ) -> (Arc<Self>, Arc<ChatHandler<D, WsTransport>>) {
        let peers: PeerMap = Arc::default();
        let transport = WsTransport {
            peers: Arc::clone(&peers),
        };
        let handler = Arc::new(ChatHandler::new(
            queue.clone(),
            session,
            transport,
            announce_channel,
        ));

        let gateway = Arc::new(Self {
            handler: Arc::clone(&handler),
            queue,
            peers,
            next_peer: AtomicU64::new(0),
        });
        (gateway, handler)
    }
}

pub fn router<D: BrowserDriver + 'static>(gateway: Arc<Gateway<D>>) -> Router {
    Router::new()
        .route("/chat", get(chat_upgrade::<D>))
        .route("/enqueue", post(enqueue::<D>))
        .with_state(gateway)
}

pub async fn serve<D: BrowserDriver + 'static>(
    listen: SocketAddr,
    gateway: Arc<Gateway<D>>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind chat gateway to {listen}"))?;
    info!(target = "jb", %listen, "chat gateway listening");

    axum::serve(listener, router(gateway)).await?;
    Ok(())
}

async fn chat_upgrade<D: BrowserDriver + 'static>(
    ws: WebSocketUpgrade,
    State(gateway): State<Arc<Gateway<D>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| bridge_session(socket, gateway))
}

async fn bridge_session<D: BrowserDriver + 'static>(socket: WebSocket, gateway: Arc<Gateway<D>>) {
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let peer = gateway.next_peer.fetch_add(1, Ordering::SeqCst);
    gateway.peers.lock().insert(peer, tx);
    info!(target = "jb", peer, "chat bridge connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = source.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        match serde_json::from_str::<InboundFrame>(text.as_str()) {
            Ok(InboundFrame::Message {
                sender,
                text,
                channel,
            }) => {
                gateway
                    .handler
                    .handle(ChatEvent {
                        sender,
                        text,
                        channel,
                    })
                    .await;
            }
            Err(err) => {
                warn!(target = "jb", peer, error = %err, "ignoring malformed chat frame");
            }
        }
    }

    gateway.peers.lock().remove(&peer);
    writer.abort();
    info!(target = "jb", peer, "chat bridge disconnected");
}

#[derive(Debug, Deserialize)]
struct EnqueueBody {
    url: String,
}

/// Manual entry: the front-end submits a URL and gets default options,
/// exactly like a bare link in chat.
async fn enqueue<D: BrowserDriver + 'static>(
    State(gateway): State<Arc<Gateway<D>>>,
    Json(body): Json<EnqueueBody>,
) -> impl IntoResponse {
    let Some(url) = parse_submission(&body.url) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "queued": false, "error": "invalid url" })),
        );
    };

    info!(target = "jb", %url, "manually queued");
    gateway.queue.enqueue(PlaybackRequest::new(url.clone()));
    (
        StatusCode::ACCEPTED,
        Json(json!({ "queued": true, "url": url.as_str() })),
    )
}

fn parse_submission(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
