use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that escape the orchestrator's per-job handling.
///
/// Per-job driver failures never show up here; the session controller
/// converts them into [`crate::types::JobOutcome::Failed`] so the loop
/// keeps running. What remains is the fatal startup path and the chat
/// edge.
#[derive(Debug, Error)]
pub enum Error {
    /// The browser session could not be acquired. The process cannot
    /// do anything useful without one; callers should exit.
    #[error("failed to acquire browser session: {0}")]
    SessionAcquisition(#[source] jb_driver::Error),

    /// An outbound chat message could not be delivered.
    #[error("chat send failed: {0}")]
    ChatSend(String),
}
