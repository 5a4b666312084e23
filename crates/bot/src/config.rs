//! Bot configuration: a JSON file layered under the CLI flags.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use jukebox::session::SessionTuning;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Looked for in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "jukebox.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Address the chat gateway listens on.
    pub listen: SocketAddr,
    /// DevTools port used for endpoint discovery.
    pub cdp_port: u16,
    /// Explicit DevTools websocket endpoint; skips discovery when set.
    pub cdp_endpoint: Option<String>,
    /// Channel job outcomes are announced to.
    pub announce_channel: String,
    /// Interval between playback-position reads, in milliseconds.
    pub poll_interval_ms: u64,
    /// Allowance past the nominal duration before a job is forced to
    /// complete, in seconds.
    pub completion_grace_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            listen: ([127, 0, 0, 1], 8765).into(),
            cdp_port: 9222,
            cdp_endpoint: None,
            announce_channel: "general".to_string(),
            poll_interval_ms: 1_000,
            completion_grace_secs: 30,
        }
    }
}

impl BotConfig {
    /// Loads configuration. An explicitly named file must exist; the
    /// default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path)
                .with_context(|| format!("failed to load config from {}", path.display())),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::read(fallback)
                        .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_FILE}"))
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// CLI flags override whatever the file said.
    pub fn merged(mut self, cli: &Cli) -> Self {
        if let Some(listen) = cli.listen {
            self.listen = listen;
        }
        if let Some(port) = cli.cdp_port {
            self.cdp_port = port;
        }
        if let Some(endpoint) = &cli.cdp_endpoint {
            self.cdp_endpoint = Some(endpoint.clone());
        }
        if let Some(channel) = &cli.announce_channel {
            self.announce_channel = channel.clone();
        }
        self
    }

    pub fn tuning(&self) -> SessionTuning {
        SessionTuning {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            completion_grace: Duration::from_secs(self.completion_grace_secs),
            ..SessionTuning::default()
        }
    }
}
