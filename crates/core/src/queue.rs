//! The FIFO job queue between command sources and the orchestrator.
//!
//! Explicitly constructed and handed to its producers and single
//! consumer; there is no process-wide queue. Backed by an unbounded
//! channel: enqueue never blocks, dequeue suspends until work arrives,
//! and insertion order is play order no matter which producer a request
//! came from.

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::PlaybackRequest;

/// Creates a connected producer/consumer pair. The producer handle is
/// cheap to clone; the consumer is unique.
pub fn queue() -> (JobQueue, JobConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobQueue { tx }, JobConsumer { rx })
}

/// Producer handle. Clone one per command source.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<PlaybackRequest>,
}

impl JobQueue {
    /// Appends a request and returns immediately. Cannot fail for a
    /// well-formed request; a vanished consumer means the process is
    /// shutting down, so the request is dropped with a warning.
    pub fn enqueue(&self, request: PlaybackRequest) {
        if let Err(rejected) = self.tx.send(request) {
            warn!(target = "jb", url = %rejected.0.url, "queue consumer gone; dropping request");
        }
    }
}

/// The single consumer end, owned by the orchestrator loop.
pub struct JobConsumer {
    rx: mpsc::UnboundedReceiver<PlaybackRequest>,
}

impl JobConsumer {
    /// Suspends until a request is available. Returns `None` only after
    /// every producer handle has been dropped.
    pub async fn dequeue(&mut self) -> Option<PlaybackRequest> {
        self.rx.recv().await
    }
}
