//! Browser session ownership and the per-job tab lifecycle.
//!
//! The controller owns the one browser session: an idle default tab
//! that exists for the life of the process, plus at most one active tab
//! bound to the in-flight job. Every session-mutating operation is
//! funneled through here so the orchestrator loop and concurrently
//! arriving control commands never race each other for the tab.
//!
//! A job moves through open → configure → play → close; completion is
//! detected by polling the media element's playback position against
//! its nominal duration, bounded by a grace ceiling, with `skip` able
//! to interrupt the poll at any point.

use std::sync::Arc;
use std::time::Duration;

use jb_driver::{BrowserDriver, TabHandle};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{JobOutcome, PlaybackRequest, ViewMode};

/// How close to the nominal duration the playback position must get
/// before the job counts as finished.
const COMPLETION_EPSILON: f64 = 0.25;

/// Knobs for completion tracking.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    /// Interval between playback-position reads.
    pub poll_interval: Duration,
    /// Extra wall-clock allowance past the nominal duration before a
    /// job is forced to complete. Guards against pages that stall or
    /// misreport their position.
    pub completion_grace: Duration,
    /// Attempts to find the media element / a usable duration before
    /// the job fails. One poll interval elapses between attempts.
    pub metadata_retries: u32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            completion_grace: Duration::from_secs(30),
            metadata_retries: 5,
        }
    }
}

struct ActiveJob {
    tab: TabHandle,
    skip: Arc<Notify>,
}

pub struct SessionController<D: BrowserDriver> {
    driver: D,
    tuning: SessionTuning,
    default_tab: TabHandle,
    active: Mutex<Option<ActiveJob>>,
}

impl<D: BrowserDriver> SessionController<D> {
    /// Acquires the session by opening the idle default tab.
    ///
    /// Failure here is fatal: without a browser session the process has
    /// nothing to do.
    pub async fn start(driver: D, tuning: SessionTuning) -> Result<Self> {
        let default_tab = driver.open_tab().await.map_err(Error::SessionAcquisition)?;
        info!(target = "jb", tab = %default_tab, "browser session ready");

        Ok(Self {
            driver,
            tuning,
            default_tab,
            active: Mutex::new(None),
        })
    }

    /// The idle tab that exists for the life of the session.
    pub fn default_tab(&self) -> &TabHandle {
        &self.default_tab
    }

    /// Runs one job to completion. The orchestrator loop is the only
    /// caller, so jobs never overlap; a second concurrent call fails
    /// fast instead of corrupting the active slot.
    pub async fn run_job(&self, request: &PlaybackRequest) -> JobOutcome {
        let tab = match self.driver.open_tab().await {
            Ok(tab) => tab,
            Err(err) => {
                return JobOutcome::Failed {
                    reason: format!("could not open tab: {err}"),
                };
            }
        };

        let skip = Arc::new(Notify::new());
        // Claim the active slot under the lock, releasing the guard
        // before any await so the slot lock is never held across one.
        let claimed = {
            let mut active = self.active.lock();
            if active.is_some() {
                false
            } else {
                *active = Some(ActiveJob {
                    tab: tab.clone(),
                    skip: Arc::clone(&skip),
                });
                true
            }
        };
        if !claimed {
            let _ = self.driver.close_tab(&tab).await;
            return JobOutcome::Failed {
                reason: "a job is already active".to_string(),
            };
        }
        debug!(target = "jb", %tab, url = %request.url, "job tab opened");

        let outcome = self.drive(&tab, &skip, request).await;

        // Single close path for every outcome, so the active slot can
        // never be left pointing at a dead tab.
        if let Err(err) = self.driver.close_tab(&tab).await {
            warn!(target = "jb", %tab, error = %err, "failed to close job tab");
        }
        *self.active.lock() = None;

        outcome
    }

    /// Pauses the active job's media element. `false` when nothing is
    /// playing or the element cannot be reached.
    pub async fn pause(&self) -> bool {
        self.control(scripts::PAUSE).await
    }

    /// Resumes the active job's media element.
    pub async fn resume(&self) -> bool {
        self.control(scripts::RESUME).await
    }

    /// Interrupts the in-flight job, resolving it as `Skipped`.
    /// `false` when no job is active.
    pub fn skip(&self) -> bool {
        match &*self.active.lock() {
            Some(job) => {
                job.skip.notify_one();
                true
            }
            None => false,
        }
    }

    /// Applies a view-mode toggle to the active tab.
    pub async fn set_view_mode(&self, mode: ViewMode) -> bool {
        self.control(scripts::view_mode(mode)).await
    }

    async fn control(&self, script: &str) -> bool {
        // Clone the handle out; the slot lock is never held across an
        // await.
        let tab = self.active.lock().as_ref().map(|job| job.tab.clone());
        let Some(tab) = tab else {
            return false;
        };

        match self.driver.evaluate(&tab, script).await {
            Ok(Value::Bool(applied)) => applied,
            Ok(_) => false,
            Err(err) => {
                debug!(target = "jb", error = %err, "control command failed");
                false
            }
        }
    }

    async fn drive(
        &self,
        tab: &TabHandle,
        skip: &Notify,
        request: &PlaybackRequest,
    ) -> JobOutcome {
        if let Err(err) = self.driver.navigate(tab, request.url.as_str()).await {
            return JobOutcome::Failed {
                reason: format!("navigation failed: {err}"),
            };
        }

        // Configure: apply the playback rate, retrying while the page
        // is still loading its player.
        let mut media_ready = false;
        for _ in 0..self.tuning.metadata_retries {
            match self
                .driver
                .evaluate(tab, &scripts::apply_rate(request.speed))
                .await
            {
                Ok(Value::Bool(true)) => {
                    media_ready = true;
                    break;
                }
                Ok(_) => {
                    if self.sleep_or_skip(skip).await {
                        return JobOutcome::Skipped;
                    }
                }
                Err(err) => {
                    return JobOutcome::Failed {
                        reason: format!("script failed: {err}"),
                    };
                }
            }
        }
        if !media_ready {
            return JobOutcome::Failed {
                reason: "no media element".to_string(),
            };
        }

        if request.fullscreen {
            match self.driver.evaluate(tab, scripts::FULLSCREEN_TOGGLE).await {
                Ok(Value::Bool(true)) => {}
                Ok(_) => debug!(target = "jb", "fullscreen control not found"),
                Err(err) => {
                    return JobOutcome::Failed {
                        reason: format!("fullscreen toggle failed: {err}"),
                    };
                }
            }
        }

        let mut duration = -1.0;
        for _ in 0..self.tuning.metadata_retries {
            match self.driver.evaluate(tab, scripts::DURATION).await {
                Ok(value) => {
                    duration = value.as_f64().unwrap_or(-1.0);
                    if duration > 0.0 {
                        break;
                    }
                    if self.sleep_or_skip(skip).await {
                        return JobOutcome::Skipped;
                    }
                }
                Err(err) => {
                    return JobOutcome::Failed {
                        reason: format!("script failed: {err}"),
                    };
                }
            }
        }
        // Live streams report an infinite duration; there is nothing to
        // wait out.
        if duration <= 0.0 || !duration.is_finite() {
            return JobOutcome::Failed {
                reason: "duration unavailable".to_string(),
            };
        }

        info!(
            target = "jb",
            url = %request.url,
            duration_secs = duration,
            speed = request.speed,
            fullscreen = request.fullscreen,
            "playing"
        );
        self.await_completion(tab, skip, duration).await
    }

    async fn await_completion(
        &self,
        tab: &TabHandle,
        skip: &Notify,
        duration: f64,
    ) -> JobOutcome {
        let nominal = Duration::from_secs_f64(duration);
        let mut deadline = Instant::now() + nominal + self.tuning.completion_grace;

        loop {
            if self.sleep_or_skip(skip).await {
                return JobOutcome::Skipped;
            }

            let progress = match self.driver.evaluate(tab, scripts::PROGRESS).await {
                Ok(value) => value,
                Err(err) => {
                    return JobOutcome::Failed {
                        reason: format!("playback tracking failed: {err}"),
                    };
                }
            };

            if progress.is_null() {
                return JobOutcome::Failed {
                    reason: "media element disappeared".to_string(),
                };
            }

            let position = progress["time"].as_f64().unwrap_or(-1.0);
            if position >= duration - COMPLETION_EPSILON {
                return JobOutcome::Completed { duration: nominal };
            }

            // The ceiling guards against stalls and misreported
            // positions, not against deliberate pauses: while the
            // element is paused the deadline moves with the clock.
            if progress["paused"].as_bool().unwrap_or(false) {
                deadline += self.tuning.poll_interval;
            } else if Instant::now() >= deadline {
                warn!(target = "jb", %tab, "completion ceiling reached; forcing job to finish");
                return JobOutcome::Completed { duration: nominal };
            }
        }
    }

    /// Sleeps one poll interval, or returns `true` immediately if the
    /// job has been skipped. The skip permit is checked first so a
    /// skip racing the final poll always wins.
    async fn sleep_or_skip(&self, skip: &Notify) -> bool {
        tokio::select! {
            biased;
            _ = skip.notified() => true,
            _ = tokio::time::sleep(self.tuning.poll_interval) => false,
        }
    }
}

/// The JavaScript the session injects. Everything returns a JSON value
/// by design: `true`/`false` for actions, `null` when the page has no
/// media element.
mod scripts {
    use crate::types::ViewMode;

    pub(super) fn apply_rate(speed: f64) -> String {
        format!(
            "(() => {{ const video = document.querySelector('video'); \
             if (!video) return null; \
             video.playbackRate = {speed}; return true; }})()"
        )
    }

    pub(super) const DURATION: &str =
        "(() => { const video = document.querySelector('video'); \
         if (!video || !Number.isFinite(video.duration) || video.duration <= 0) return -1; \
         return video.duration; })()";

    pub(super) const PROGRESS: &str =
        "(() => { const video = document.querySelector('video'); \
         if (!video) return null; \
         return { time: video.currentTime, paused: video.paused }; })()";

    pub(super) const PAUSE: &str =
        "(() => { const video = document.querySelector('video'); \
         if (!video) return false; \
         video.pause(); return true; })()";

    pub(super) const RESUME: &str =
        "(() => { const video = document.querySelector('video'); \
         if (!video) return false; \
         video.play(); return true; })()";

    pub(super) const FULLSCREEN_TOGGLE: &str =
        "(() => { const button = document.querySelector('.ytp-fullscreen-button'); \
         if (!button) return false; \
         button.click(); return true; })()";

    const THEATER_TOGGLE: &str =
        "(() => { const button = document.querySelector('.ytp-size-button'); \
         if (!button) return false; \
         button.click(); return true; })()";

    const VIEW_DEFAULT: &str =
        "(() => { if (document.fullscreenElement) document.exitFullscreen(); \
         const flexy = document.querySelector('ytd-watch-flexy[theater]'); \
         if (flexy) { const button = document.querySelector('.ytp-size-button'); \
         if (button) button.click(); } return true; })()";

    pub(super) fn view_mode(mode: ViewMode) -> &'static str {
        match mode {
            ViewMode::Fullscreen => FULLSCREEN_TOGGLE,
            ViewMode::Theater => THEATER_TOGGLE,
            ViewMode::Default => VIEW_DEFAULT,
        }
    }
}
