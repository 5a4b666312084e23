// jb-core: the playback job orchestrator.
//
// Chat text comes in, typed requests go onto a FIFO queue, and a single
// consumer loop plays them one at a time through the browser session.
// The browser itself is only reachable through jb-driver's capability
// trait, which keeps everything here testable against a fake.

pub mod chat;
pub mod command;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod session;
pub mod types;

pub use error::{Error, Result};
pub use orchestrator::{Notifier, Orchestrator};
pub use queue::{JobConsumer, JobQueue};
pub use session::{SessionController, SessionTuning};
pub use types::{ControlCommand, JobOutcome, PlaybackRequest, ViewMode};
