//! End-to-end orchestration over the fake driver: queue in, outcomes
//! out, strictly in order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jb_driver::fake::{self, DriverCall, FakeDriverController};
use jukebox::orchestrator::{Notifier, Orchestrator};
use jukebox::queue;
use jukebox::session::{SessionController, SessionTuning};
use jukebox::types::{JobOutcome, PlaybackRequest};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

struct ChannelNotifier {
    tx: mpsc::UnboundedSender<(Url, JobOutcome)>,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn job_finished(&self, request: &PlaybackRequest, outcome: &JobOutcome) {
        let _ = self.tx.send((request.url.clone(), outcome.clone()));
    }
}

fn request(name: &str) -> PlaybackRequest {
    PlaybackRequest::new(Url::parse(&format!("https://youtu.be/{name}")).unwrap())
}

/// Pages whose videos report `duration` and advance one second per
/// position poll.
fn script_instant_pages(controller: &FakeDriverController, duration: f64) {
    controller.on_evaluate(|expr| expr.contains("playbackRate").then(|| json!(true)));
    controller.on_evaluate(move |expr| expr.contains("video.duration").then(|| json!(duration)));
    let position = Arc::new(Mutex::new(0.0_f64));
    controller.on_evaluate(move |expr| {
        expr.contains("currentTime").then(|| {
            let mut position = position.lock();
            *position += 1.0;
            json!({ "time": *position, "paused": false })
        })
    });
}

fn navigated_urls(controller: &FakeDriverController) -> Vec<String> {
    controller
        .calls()
        .iter()
        .filter_map(|call| match call {
            DriverCall::Navigate { url, .. } => Some(url.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn jobs_play_in_enqueue_order_across_sources() {
    let (driver, controller) = fake::pair();
    script_instant_pages(&controller, 2.0);

    let session = Arc::new(
        SessionController::start(driver, SessionTuning::default())
            .await
            .unwrap(),
    );
    let (chat_producer, consumer) = queue::queue();
    let manual_producer = chat_producer.clone();

    // Interleave the two sources the way chat and the manual entry
    // field would.
    chat_producer.enqueue(request("a"));
    manual_producer.enqueue(request("b"));
    chat_producer.enqueue(request("c"));

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(session, consumer, ChannelNotifier { tx });
    drop(chat_producer);
    drop(manual_producer);
    orchestrator.run().await;

    let mut finished = Vec::new();
    while let Some((url, outcome)) = outcomes.recv().await {
        finished.push((url, outcome));
    }

    assert_eq!(
        finished
            .iter()
            .map(|(url, _)| url.path().to_string())
            .collect::<Vec<_>>(),
        vec!["/a", "/b", "/c"]
    );
    assert!(finished.iter().all(|(_, outcome)| matches!(
        outcome,
        JobOutcome::Completed { .. }
    )));
    assert_eq!(
        navigated_urls(&controller),
        vec![
            "https://youtu.be/a".to_string(),
            "https://youtu.be/b".to_string(),
            "https://youtu.be/c".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_job_does_not_stop_the_loop() {
    let (driver, controller) = fake::pair();
    script_instant_pages(&controller, 2.0);

    let session = Arc::new(
        SessionController::start(driver, SessionTuning::default())
            .await
            .unwrap(),
    );
    let (producer, consumer) = queue::queue();

    producer.enqueue(request("bad"));
    producer.enqueue(request("good"));
    producer.enqueue(request("also-good"));

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(session, consumer, ChannelNotifier { tx });

    // The first navigation fails; the loop must report it and move on.
    controller.fail_navigation("net::ERR_CONNECTION_RESET");

    drop(producer);
    orchestrator.run().await;

    let mut finished = Vec::new();
    while let Some(entry) = outcomes.recv().await {
        finished.push(entry);
    }

    assert_eq!(finished.len(), 3);
    assert!(matches!(finished[0].1, JobOutcome::Failed { .. }));
    assert!(matches!(finished[1].1, JobOutcome::Completed { .. }));
    assert!(matches!(finished[2].1, JobOutcome::Completed { .. }));
}

#[tokio::test(start_paused = true)]
async fn skip_affects_only_the_current_job() {
    let (driver, controller) = fake::pair();
    controller.on_evaluate(|expr| expr.contains("playbackRate").then(|| json!(true)));
    controller.on_evaluate(|expr| expr.contains("video.duration").then(|| json!(50_000.0)));
    let position = Arc::new(Mutex::new(0.0_f64));
    let skip_positions = Arc::clone(&position);
    controller.on_evaluate(move |expr| {
        expr.contains("currentTime").then(|| {
            let mut position = skip_positions.lock();
            *position += 1.0;
            // Job A finishes at 50000s; B and C would take just as
            // long, so only a skip moves the queue along.
            json!({ "time": *position, "paused": false })
        })
    });

    let session = Arc::new(
        SessionController::start(driver, SessionTuning::default())
            .await
            .unwrap(),
    );
    let (producer, consumer) = queue::queue();

    producer.enqueue(request("a"));
    producer.enqueue(request("b"));
    producer.enqueue(request("c"));

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(Arc::clone(&session), consumer, ChannelNotifier { tx });
    let loop_task = tokio::spawn(orchestrator.run());

    // A completes on its own once its position catches up; fast-forward
    // by skipping it, then let B start and skip that too.
    let (url_a, outcome_a) = {
        // Wait for A to be mid-playback, then skip.
        while navigated_count(&controller) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        while !session.skip() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        outcomes.recv().await.unwrap()
    };
    assert_eq!(url_a.path(), "/a");
    assert_eq!(outcome_a, JobOutcome::Skipped);

    // B is next in line; skip it as well.
    while navigated_count(&controller) < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    while !session.skip() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (url_b, outcome_b) = outcomes.recv().await.unwrap();
    assert_eq!(url_b.path(), "/b");
    assert_eq!(outcome_b, JobOutcome::Skipped);

    // C starts only after B resolved; skip it too to wind the test down.
    while navigated_count(&controller) < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    session.skip();
    let (url_c, outcome_c) = outcomes.recv().await.unwrap();
    assert_eq!(url_c.path(), "/c");
    assert_eq!(outcome_c, JobOutcome::Skipped);

    drop(producer);
    loop_task.await.unwrap();
}

fn navigated_count(controller: &FakeDriverController) -> usize {
    controller
        .calls()
        .iter()
        .filter(|call| matches!(call, DriverCall::Navigate { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn full_request_plays_out_end_to_end() {
    let (driver, controller) = fake::pair();
    script_instant_pages(&controller, 120.0);
    controller.on_evaluate(|expr| expr.contains("ytp-fullscreen-button").then(|| json!(true)));

    let session = Arc::new(
        SessionController::start(driver, SessionTuning::default())
            .await
            .unwrap(),
    );
    let (producer, consumer) = queue::queue();
    producer.enqueue(
        request("xyz123").with_speed(1.5).with_fullscreen(true),
    );
    drop(producer);

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let started_at = tokio::time::Instant::now();
    Orchestrator::new(session, consumer, ChannelNotifier { tx })
        .run()
        .await;

    let (url, outcome) = outcomes.recv().await.unwrap();
    assert_eq!(url.as_str(), "https://youtu.be/xyz123");
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            duration: Duration::from_secs(120)
        }
    );

    // The nominal duration was actually awaited on the (paused) clock.
    let elapsed = started_at.elapsed();
    assert!(elapsed >= Duration::from_secs(120), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(160), "elapsed {elapsed:?}");

    let calls = controller.calls();
    assert!(calls.iter().any(|call| matches!(
        call,
        DriverCall::Evaluate { expression, .. } if expression.contains("playbackRate = 1.5")
    )));
    assert!(calls.iter().any(|call| matches!(
        call,
        DriverCall::Evaluate { expression, .. } if expression.contains("ytp-fullscreen-button")
    )));
    // Job tab closed; only the idle default tab is left.
    assert_eq!(controller.open_tabs().len(), 1);
}
