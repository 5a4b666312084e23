//! The top-level sequencing loop: one queue, one consumer, one job at
//! a time.

use std::sync::Arc;

use async_trait::async_trait;
use jb_driver::BrowserDriver;
use tracing::{error, info};

use crate::queue::JobConsumer;
use crate::session::SessionController;
use crate::types::{JobOutcome, PlaybackRequest};

/// Receives the outcome of every finished job, typically to narrate it
/// back into chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn job_finished(&self, request: &PlaybackRequest, outcome: &JobOutcome);
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn job_finished(&self, request: &PlaybackRequest, outcome: &JobOutcome) {
        (**self).job_finished(request, outcome).await;
    }
}

pub struct Orchestrator<D: BrowserDriver, N: Notifier> {
    session: Arc<SessionController<D>>,
    jobs: JobConsumer,
    notifier: N,
}

impl<D: BrowserDriver, N: Notifier> Orchestrator<D, N> {
    pub fn new(session: Arc<SessionController<D>>, jobs: JobConsumer, notifier: N) -> Self {
        Self {
            session,
            jobs,
            notifier,
        }
    }

    /// Plays queued jobs strictly in enqueue order, forever.
    ///
    /// The loop is the sole consumer of the queue and the sole caller
    /// of `run_job`, which is what guarantees jobs never overlap. A
    /// failed job is reported and the loop moves on; only queue
    /// shutdown (every producer dropped) ends it.
    pub async fn run(mut self) {
        while let Some(request) = self.jobs.dequeue().await {
            info!(target = "jb", url = %request.url, "job started");
            let outcome = self.session.run_job(&request).await;

            match &outcome {
                JobOutcome::Completed { duration } => {
                    info!(
                        target = "jb",
                        url = %request.url,
                        duration_secs = duration.as_secs(),
                        "job completed"
                    );
                }
                JobOutcome::Skipped => {
                    info!(target = "jb", url = %request.url, "job skipped");
                }
                JobOutcome::Failed { reason } => {
                    error!(target = "jb", url = %request.url, %reason, "job failed");
                }
            }

            self.notifier.job_finished(&request, &outcome).await;
        }

        info!(target = "jb", "job queue closed; orchestrator stopping");
    }
}
