use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the driver layer.
///
/// Every variant represents a failed remote call; callers above the
/// session boundary convert these into per-job outcomes rather than
/// letting them propagate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The browser endpoint answered with a protocol-level error object.
    #[error("browser rejected {method}: {message} (code {code})")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },

    /// A response arrived that does not match the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Script evaluation reached the page but threw.
    #[error("evaluation threw: {0}")]
    Evaluation(String),

    /// The connection closed while requests were still in flight.
    #[error("driver connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
