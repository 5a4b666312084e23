//! Chat-facing behavior: dispatching parsed commands and talking back.
//!
//! Every accepted command produces exactly one confirmation or result
//! message, and every malformed command produces exactly one corrective
//! message. Messages that are not addressed to the jukebox produce
//! nothing at all.

use std::sync::Arc;

use async_trait::async_trait;
use jb_driver::BrowserDriver;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::command::{self, ChatCommand};
use crate::error::Result;
use crate::orchestrator::Notifier;
use crate::queue::JobQueue;
use crate::session::SessionController;
use crate::types::{ControlCommand, JobOutcome, PlaybackRequest};

/// Opaque routing handle for one chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound chat message.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub sender: String,
    pub text: String,
    pub channel: ChannelId,
}

/// Outbound side of the chat transport. Implementations route `text`
/// to `channel`; connection management is theirs alone.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, channel: &ChannelId, text: &str) -> Result<()>;
}

pub struct ChatHandler<D: BrowserDriver, T: ChatTransport> {
    queue: JobQueue,
    session: Arc<SessionController<D>>,
    transport: T,
    announce_channel: ChannelId,
}

impl<D: BrowserDriver, T: ChatTransport> ChatHandler<D, T> {
    pub fn new(
        queue: JobQueue,
        session: Arc<SessionController<D>>,
        transport: T,
        announce_channel: ChannelId,
    ) -> Self {
        Self {
            queue,
            session,
            transport,
            announce_channel,
        }
    }

    /// Handles one inbound message end to end.
    pub async fn handle(&self, event: ChatEvent) {
        match command::parse(&event.text) {
            Ok(Some(ChatCommand::Play(request))) => {
                let confirmation = enqueue_confirmation(&request);
                self.queue.enqueue(request);
                self.reply(&event.channel, &confirmation).await;
            }
            Ok(Some(ChatCommand::Control(control))) => {
                let result = self.apply_control(control).await;
                self.reply(&event.channel, &result).await;
            }
            Ok(Some(ChatCommand::Help)) => {
                self.reply(&event.channel, command::USAGE).await;
            }
            // Not addressed to us; stay quiet.
            Ok(None) => {}
            Err(parse_error) => {
                self.reply(&event.channel, &parse_error.to_string()).await;
            }
        }
    }

    async fn apply_control(&self, control: ControlCommand) -> String {
        match control {
            ControlCommand::Pause => {
                if self.session.pause().await {
                    "Paused. Hurry back.".to_string()
                } else {
                    "Nothing is playing to pause.".to_string()
                }
            }
            ControlCommand::Resume => {
                if self.session.resume().await {
                    "Playing again!".to_string()
                } else {
                    "Nothing is playing to resume.".to_string()
                }
            }
            ControlCommand::Skip => {
                if self.session.skip() {
                    "Skipped! On to the next one.".to_string()
                } else {
                    "No video is playing right now.".to_string()
                }
            }
            ControlCommand::SetViewMode(mode) => {
                if self.session.set_view_mode(mode).await {
                    format!("Changed view mode to {mode}.")
                } else {
                    "Could not change the view mode.".to_string()
                }
            }
        }
    }

    async fn reply(&self, channel: &ChannelId, text: &str) {
        if let Err(err) = self.transport.send(channel, text).await {
            warn!(target = "jb", %channel, error = %err, "failed to deliver chat reply");
        }
    }
}

fn enqueue_confirmation(request: &PlaybackRequest) -> String {
    let mut confirmation = format!(
        "Added {} to the queue at {}x speed",
        request.url, request.speed
    );
    if request.fullscreen {
        confirmation.push_str(" in fullscreen");
    }
    confirmation.push('.');
    confirmation
}

#[async_trait]
impl<D: BrowserDriver, T: ChatTransport> Notifier for ChatHandler<D, T> {
    async fn job_finished(&self, request: &PlaybackRequest, outcome: &JobOutcome) {
        let text = match outcome {
            JobOutcome::Completed { duration } => {
                format!("Finished {} after {}s.", request.url, duration.as_secs())
            }
            JobOutcome::Skipped => format!("Skipped {}.", request.url),
            JobOutcome::Failed { reason } => {
                format!("Could not play {}: {}.", request.url, reason)
            }
        };
        self.reply(&self.announce_channel, &text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue;
    use crate::session::SessionTuning;
    use jb_driver::fake;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<(ChannelId, String)>>>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send(&self, channel: &ChannelId, text: &str) -> Result<()> {
            self.sent.lock().push((channel.clone(), text.to_string()));
            Ok(())
        }
    }

    fn event(text: &str) -> ChatEvent {
        ChatEvent {
            sender: "viewer".to_string(),
            text: text.to_string(),
            channel: ChannelId("stream".to_string()),
        }
    }

    async fn handler() -> (
        ChatHandler<fake::FakeDriver, RecordingTransport>,
        crate::queue::JobConsumer,
        RecordingTransport,
    ) {
        let (driver, _controller) = fake::pair();
        let session = Arc::new(
            SessionController::start(driver, SessionTuning::default())
                .await
                .unwrap(),
        );
        let (producer, consumer) = queue::queue();
        let transport = RecordingTransport::default();
        let handler = ChatHandler::new(
            producer,
            session,
            transport.clone(),
            ChannelId("announce".to_string()),
        );
        (handler, consumer, transport)
    }

    #[tokio::test]
    async fn play_command_enqueues_and_confirms_once() {
        let (handler, mut consumer, transport) = handler().await;

        handler.handle(event("!play https://youtu.be/xyz123 --speed 1.5")).await;

        let queued = consumer.dequeue().await.unwrap();
        assert_eq!(queued.speed, 1.5);

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChannelId("stream".to_string()));
        assert!(sent[0].1.contains("1.5x"));
    }

    #[tokio::test]
    async fn malformed_play_gets_one_corrective_message() {
        let (handler, _consumer, transport) = handler().await;

        handler.handle(event("!play not a url")).await;

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("!play <url>"));
    }

    #[tokio::test]
    async fn unknown_view_mode_gets_one_corrective_message() {
        let (handler, _consumer, transport) = handler().await;

        handler.handle(event("!view loud")).await;

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("loud"));
    }

    #[tokio::test]
    async fn control_with_no_active_job_is_narrated_not_dropped() {
        let (handler, _consumer, transport) = handler().await;

        handler.handle(event("!pause")).await;
        handler.handle(event("!skip")).await;

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("Nothing is playing"));
        assert!(sent[1].1.contains("No video is playing"));
    }

    #[tokio::test]
    async fn unrelated_chatter_produces_no_reply() {
        let (handler, _consumer, transport) = handler().await;

        handler.handle(event("anyone up for lunch?")).await;

        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn help_replies_with_usage() {
        let (handler, _consumer, transport) = handler().await;

        handler.handle(event("?help")).await;

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("--speed"));
    }

    #[tokio::test]
    async fn outcomes_are_announced_to_the_announce_channel() {
        let (handler, _consumer, transport) = handler().await;
        let request = PlaybackRequest::new(url::Url::parse("https://youtu.be/xyz123").unwrap());

        handler
            .job_finished(
                &request,
                &JobOutcome::Failed {
                    reason: "no media element".to_string(),
                },
            )
            .await;

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChannelId("announce".to_string()));
        assert!(sent[0].1.contains("no media element"));
    }
}
