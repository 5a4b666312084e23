//! The capability surface the orchestrator consumes.
//!
//! jb-core never talks CDP directly; it holds a `dyn BrowserDriver` and
//! a handful of `TabHandle`s. Keeping the trait this narrow is what lets
//! the session controller be tested against [`crate::fake::FakeDriver`]
//! without a browser.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Opaque reference to one browser tab.
///
/// `target_id` identifies the tab for lifecycle calls; `session_id` is
/// the attached protocol session used for in-page calls (navigation,
/// evaluation). Handles are cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabHandle {
    target_id: String,
    session_id: String,
}

impl TabHandle {
    pub fn new(target_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl std::fmt::Display for TabHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.target_id)
    }
}

/// Fallible remote calls against one browser instance.
///
/// All four operations may fail at any time (the browser is a separate
/// process); none of them retries internally.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Opens a fresh tab and returns its handle.
    async fn open_tab(&self) -> Result<TabHandle>;

    /// Navigates `tab` to `url` and waits for the navigation to be accepted.
    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<()>;

    /// Evaluates a JavaScript expression in `tab` and returns its value.
    ///
    /// The expression result is serialized by value; promises are
    /// awaited. A throwing expression is an [`crate::Error::Evaluation`].
    async fn evaluate(&self, tab: &TabHandle, expression: &str) -> Result<Value>;

    /// Closes `tab`. Closing an already-closed tab is an error.
    async fn close_tab(&self, tab: &TabHandle) -> Result<()>;
}
