//! DevTools endpoint discovery.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// `/json/version` response subset from the DevTools HTTP endpoint.
#[derive(Debug, Deserialize)]
pub struct CdpVersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
    #[serde(rename = "Browser")]
    pub browser: Option<String>,
}

/// Resolves the debugger websocket URL from `/json/version` on `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<CdpVersionInfo> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(400))
        .build()
        .context("failed to create HTTP client")?;
    let mut last_error = "no response".to_string();

    for url in [
        format!("http://127.0.0.1:{port}/json/version"),
        format!("http://localhost:{port}/json/version"),
        format!("http://[::1]:{port}/json/version"),
    ] {
        let response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                last_error = err.to_string();
                continue;
            }
        };

        if !response.status().is_success() {
            last_error = format!("unexpected status {}", response.status());
            continue;
        }

        let info: CdpVersionInfo = response
            .json()
            .await
            .context("failed to parse DevTools version response")?;
        return Ok(info);
    }

    Err(anyhow!("failed to connect to port {port}: {last_error}"))
}

/// Discovers a debug-enabled browser, with a launch hint when none is
/// listening.
pub async fn discover_browser(port: u16) -> Result<CdpVersionInfo> {
    fetch_cdp_endpoint(port).await.with_context(|| {
        format!(
            "no browser with remote debugging found on port {port}; \
             try: chromium --remote-debugging-port={port}"
        )
    })
}
