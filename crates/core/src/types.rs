//! Typed data model shared across the orchestrator.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Playback speed applied when a request does not override it.
pub const DEFAULT_SPEED: f64 = 1.0;

/// One queued playback job. Immutable once enqueued; consumed exactly
/// once by the orchestrator loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub url: Url,
    pub speed: f64,
    pub fullscreen: bool,
}

impl PlaybackRequest {
    /// A request with default options (normal speed, windowed).
    pub fn new(url: Url) -> Self {
        Self {
            url,
            speed: DEFAULT_SPEED,
            fullscreen: false,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }
}

/// Instruction applied to whatever job is active right now. Never
/// queued; a control command with no active job is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Skip,
    SetViewMode(ViewMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Fullscreen,
    Theater,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown view mode `{0}`")]
pub struct UnknownViewMode(pub String);

impl FromStr for ViewMode {
    type Err = UnknownViewMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fullscreen" => Ok(Self::Fullscreen),
            "theater" => Ok(Self::Theater),
            "default" => Ok(Self::Default),
            other => Err(UnknownViewMode(other.to_string())),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fullscreen => "fullscreen",
            Self::Theater => "theater",
            Self::Default => "default",
        })
    }
}

/// Result of one finished job, reported to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { duration: Duration },
    Failed { reason: String },
    Skipped,
}
