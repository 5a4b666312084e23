//! Request/response correlation over a transport.
//!
//! Chrome's DevTools protocol is JSON-RPC shaped: every command carries a
//! client-chosen `id`, and the matching response echoes it. The
//! connection hands out ids from an atomic counter, parks each caller on
//! a oneshot channel, and a background dispatch loop routes inbound
//! frames either to the parked caller (responses) or to the log
//! (events, which jukebox does not subscribe to).
//!
//! Message flow:
//! 1. caller invokes [`Connection::send_command`]
//! 2. the request is serialized and written to the transport
//! 3. the dispatch loop receives the response frame
//! 4. the frame is correlated by `id` and delivered via oneshot

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts};

/// Command frame sent to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub method: String,
    pub params: Value,
}

/// Error object the browser attaches to a failed command.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

struct PendingRequest {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
}

pub struct Connection {
    next_id: AtomicU32,
    sender: AsyncMutex<Box<dyn Transport>>,
    pending: Mutex<HashMap<u32, PendingRequest>>,
    message_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<Value>>>,
}

impl Connection {
    /// Wraps transport parts and spawns the inbound pump. The caller
    /// must still spawn [`Connection::run`] to dispatch messages.
    pub fn new(parts: TransportParts) -> Arc<Self> {
        tokio::spawn(parts.receiver.run());

        Arc::new(Self {
            next_id: AtomicU32::new(0),
            sender: AsyncMutex::new(parts.sender),
            pending: Mutex::new(HashMap::new()),
            message_rx: AsyncMutex::new(Some(parts.message_rx)),
        })
    }

    /// Sends `method` with `params`, optionally scoped to a protocol
    /// session, and waits for the correlated response.
    pub async fn send_command(
        &self,
        method: &str,
        session_id: Option<&str>,
        params: Value,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id,
            PendingRequest {
                method: method.to_string(),
                tx,
            },
        );

        let request = Request {
            id,
            session_id: session_id.map(str::to_string),
            method: method.to_string(),
            params,
        };
        trace!(target = "jb", id, method, "sending command");

        let message = serde_json::to_value(&request)?;
        if let Err(err) = self.sender.lock().await.send(message).await {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            // Dispatch loop dropped the sender without answering.
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Dispatch loop. Runs until the transport closes, then fails every
    /// still-pending request with [`Error::ConnectionClosed`].
    pub async fn run(&self) {
        let Some(mut rx) = self.message_rx.lock().await.take() else {
            warn!(target = "jb", "connection dispatch loop started twice");
            return;
        };

        while let Some(message) = rx.recv().await {
            self.dispatch(message);
        }

        debug!(target = "jb", "transport closed, failing pending requests");
        let pending = std::mem::take(&mut *self.pending.lock());
        for (_, request) in pending {
            let _ = request.tx.send(Err(Error::ConnectionClosed));
        }
    }

    fn dispatch(&self, message: Value) {
        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            // Unsolicited event. Jukebox drives the browser purely by
            // request/response; events are only useful for debugging.
            let method = message.get("method").and_then(Value::as_str).unwrap_or("?");
            trace!(target = "jb", method, "ignoring browser event");
            return;
        };

        let Some(request) = self.pending.lock().remove(&(id as u32)) else {
            warn!(target = "jb", id, "response with no pending request");
            return;
        };

        let result = match message.get("error") {
            Some(raw) => match serde_json::from_value::<RemoteError>(raw.clone()) {
                Ok(remote) => Err(Error::Remote {
                    method: request.method,
                    code: remote.code,
                    message: remote.message,
                }),
                Err(_) => Err(Error::Protocol(format!("malformed error object: {raw}"))),
            },
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };

        let _ = request.tx.send(result);
    }
}
