//! [`BrowserDriver`] implementation over the Chrome DevTools protocol.
//!
//! Attaches to an already-running browser through its debugger WebSocket
//! endpoint (`--remote-debugging-port`). Tab lifecycle goes through the
//! browser-level `Target` domain; in-page calls are scoped to the
//! per-tab session obtained from `Target.attachToTarget`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::capability::{BrowserDriver, TabHandle};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::transport;

pub struct CdpDriver {
    connection: Arc<Connection>,
}

impl CdpDriver {
    /// Connects to a debugger WebSocket endpoint, e.g.
    /// `ws://127.0.0.1:9222/devtools/browser/<uuid>`.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let parts = transport::connect(ws_url).await?;
        let connection = Connection::new(parts);

        let dispatch = Arc::clone(&connection);
        tokio::spawn(async move { dispatch.run().await });

        info!(target = "jb", endpoint = %ws_url, "attached to browser");
        Ok(Self { connection })
    }

    fn require_str(value: &Value, pointer: &str, method: &str) -> Result<String> {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Protocol(format!("{method} response missing {pointer}"))
            })
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn open_tab(&self) -> Result<TabHandle> {
        let created = self
            .connection
            .send_command("Target.createTarget", None, json!({ "url": "about:blank" }))
            .await?;
        let target_id = Self::require_str(&created, "/targetId", "Target.createTarget")?;

        let attached = self
            .connection
            .send_command(
                "Target.attachToTarget",
                None,
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = Self::require_str(&attached, "/sessionId", "Target.attachToTarget")?;

        debug!(target = "jb", %target_id, "opened tab");
        Ok(TabHandle::new(target_id, session_id))
    }

    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<()> {
        let result = self
            .connection
            .send_command(
                "Page.navigate",
                Some(tab.session_id()),
                json!({ "url": url }),
            )
            .await?;

        // A resolved Page.navigate can still carry a load failure.
        if let Some(text) = result.get("errorText").and_then(Value::as_str) {
            return Err(Error::Protocol(format!("navigation to {url} failed: {text}")));
        }
        Ok(())
    }

    async fn evaluate(&self, tab: &TabHandle, expression: &str) -> Result<Value> {
        let result = self
            .connection
            .send_command(
                "Runtime.evaluate",
                Some(tab.session_id()),
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.pointer("/text"))
                .and_then(Value::as_str)
                .unwrap_or("unknown exception");
            return Err(Error::Evaluation(text.to_string()));
        }

        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    async fn close_tab(&self, tab: &TabHandle) -> Result<()> {
        self.connection
            .send_command(
                "Target.closeTarget",
                None,
                json!({ "targetId": tab.target_id() }),
            )
            .await?;
        debug!(target = "jb", target_id = %tab.target_id(), "closed tab");
        Ok(())
    }
}
