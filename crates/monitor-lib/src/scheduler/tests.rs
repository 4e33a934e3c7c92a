//! Scenario tests for the tick pipeline
//!
//! These drive whole ticks against in-memory collaborators: a scripted
//! reading source and a channel that records (or refuses) deliveries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use super::*;
use crate::alerting::{AlertDecision, Dispatcher};
use crate::error::{DeliveryError, SourceError, TickError};
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::{NotificationMessage, Priority, Reading};
use crate::notify::NotificationChannel;
use crate::observability::StructuredLogger;
use crate::source::ReadingSource;

/// Source that replays a fixed script, then fails
struct ScriptedSource {
    script: Mutex<VecDeque<Result<f64, String>>>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<f64, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    fn readings(values: &[f64]) -> Self {
        Self::new(values.iter().map(|v| Ok(*v)).collect())
    }
}

#[async_trait]
impl ReadingSource for ScriptedSource {
    async fn fetch_current(&self) -> Result<Reading, SourceError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(Reading::now(value)),
            Some(Err(message)) => Err(SourceError::Other(message)),
            None => Err(SourceError::Other("script exhausted".to_string())),
        }
    }
}

/// Channel that records deliveries and can refuse chosen priorities
#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<NotificationMessage>>,
    refuse: Vec<Priority>,
}

impl RecordingChannel {
    fn refusing(refuse: Vec<Priority>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            refuse,
        }
    }

    fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.title.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        if self.refuse.contains(&message.priority) {
            return Err(DeliveryError::Rejected {
                status: 500,
                errors: "pushover unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_secs(600),
        window_capacity: 6,
        examine_count: 6,
        low_threshold: 3.5,
        high_threshold: 22.0,
        escalation_threshold: 6,
        ..EngineConfig::default()
    }
}

/// Source that records when each fetch starts and ends on the tokio clock
struct TimedSource {
    origin: tokio::time::Instant,
    delays: Mutex<VecDeque<Duration>>,
    fetches: Mutex<Vec<(u64, u64)>>,
}

impl TimedSource {
    fn new(delays: Vec<Duration>) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            delays: Mutex::new(delays.into()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    fn starts(&self) -> Vec<u64> {
        self.fetches.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

#[async_trait]
impl ReadingSource for TimedSource {
    async fn fetch_current(&self) -> Result<Reading, SourceError> {
        let start = self.origin.elapsed().as_secs();
        let delay = self.delays.lock().unwrap().pop_front().unwrap_or_default();
        tokio::time::sleep(delay).await;
        let end = self.origin.elapsed().as_secs();
        self.fetches.lock().unwrap().push((start, end));
        Ok(Reading::now(5.5))
    }
}

fn pipeline(
    source: ScriptedSource,
    channel: Arc<RecordingChannel>,
    health: HealthRegistry,
) -> TickPipeline {
    pipeline_with(Arc::new(source), channel, health)
}

fn pipeline_with(
    source: Arc<dyn ReadingSource>,
    channel: Arc<RecordingChannel>,
    health: HealthRegistry,
) -> TickPipeline {
    let config = engine_config();
    let dispatcher = Dispatcher::new(channel, config.examine_count, config.tick_interval);
    let sender = AlertSender::new(dispatcher, health, StructuredLogger::new("test"));
    TickPipeline::new(&config, source, sender)
}

fn decision_of(outcome: &TickOutcome) -> AlertDecision {
    match outcome {
        TickOutcome::Success { decision, .. } => *decision,
        TickOutcome::FailureHandled { .. } => AlertDecision::None,
    }
}

#[tokio::test]
async fn test_sustained_low_fires_on_sixth_tick() {
    let channel = Arc::new(RecordingChannel::default());
    let mut p = pipeline(
        ScriptedSource::readings(&[2.0, 2.1, 1.9, 2.5, 3.0, 1.5]),
        channel.clone(),
        HealthRegistry::new(),
    );

    for _ in 0..5 {
        let outcome = p.tick().await.unwrap();
        assert_eq!(decision_of(&outcome), AlertDecision::None);
    }
    assert!(channel.titles().is_empty());

    let outcome = p.tick().await.unwrap();
    assert_eq!(decision_of(&outcome), AlertDecision::SustainedLow);

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Extended Low Glucose Alarm");
    assert_eq!(sent[0].priority, Priority::Emergency);
    assert!(sent[0].body.contains("1.5 mmol/L over last 6 readings, 10 min intervals."));
}

#[tokio::test]
async fn test_sustained_condition_realarms_every_tick() {
    let channel = Arc::new(RecordingChannel::default());
    let mut p = pipeline(
        ScriptedSource::readings(&[25.0, 24.0, 23.0, 26.0, 27.0, 30.0, 28.0]),
        channel.clone(),
        HealthRegistry::new(),
    );

    for _ in 0..7 {
        p.tick().await.unwrap();
    }

    assert_eq!(
        channel.titles(),
        vec!["Extended High Glucose Alarm", "Extended High Glucose Alarm"]
    );
}

#[tokio::test]
async fn test_in_range_readings_never_alarm() {
    let channel = Arc::new(RecordingChannel::default());
    let mut p = pipeline(
        ScriptedSource::readings(&[5.0, 6.0, 7.0, 6.0, 5.0, 6.0]),
        channel.clone(),
        HealthRegistry::new(),
    );

    for _ in 0..6 {
        let outcome = p.tick().await.unwrap();
        assert_eq!(decision_of(&outcome), AlertDecision::None);
    }
    assert!(channel.titles().is_empty());
    assert_eq!(p.window().values(), vec![5.0, 6.0, 7.0, 6.0, 5.0, 6.0]);
}

#[tokio::test]
async fn test_failure_streak_escalates_once_then_recovers_once() {
    let mut script: Vec<Result<f64, String>> = (0..7)
        .map(|i| Err(format!("LibreLinkUp timeout #{}", i + 1)))
        .collect();
    script.push(Ok(5.5));
    script.push(Ok(5.6));

    let channel = Arc::new(RecordingChannel::default());
    let health = HealthRegistry::new();
    let mut p = pipeline(ScriptedSource::new(script), channel.clone(), health.clone());

    for i in 1..=7u32 {
        let outcome = p.tick().await.unwrap();
        match outcome {
            TickOutcome::FailureHandled {
                consecutive_failures,
                escalated,
                ..
            } => {
                assert_eq!(consecutive_failures, i);
                assert_eq!(escalated, i == 6);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        if i < 6 {
            assert_eq!(
                health.status_of(components::SOURCE).await,
                Some(ComponentStatus::Degraded)
            );
        }
    }

    assert_eq!(channel.titles(), vec!["Monitoring disrupted"]);
    assert!(channel.sent.lock().unwrap()[0]
        .body
        .ends_with("LibreLinkUp timeout #6"));
    assert_eq!(
        health.status_of(components::SOURCE).await,
        Some(ComponentStatus::Unhealthy)
    );

    let outcome = p.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Success { recovered: true, .. }));
    let outcome = p.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Success { recovered: false, .. }));

    assert_eq!(
        channel.titles(),
        vec!["Monitoring disrupted", "Error state cleared"]
    );
    assert_eq!(
        health.status_of(components::SOURCE).await,
        Some(ComponentStatus::Healthy)
    );
}

#[tokio::test]
async fn test_short_failure_streak_recovers_silently() {
    let script = vec![Err("timeout".to_string()), Err("timeout".to_string()), Ok(6.0)];
    let channel = Arc::new(RecordingChannel::default());
    let mut p = pipeline(ScriptedSource::new(script), channel.clone(), HealthRegistry::new());

    for _ in 0..3 {
        p.tick().await.unwrap();
    }

    assert!(channel.titles().is_empty());
    assert_eq!(p.failures().consecutive_count(), 0);
}

#[tokio::test]
async fn test_failure_leaves_window_untouched() {
    let script = vec![Ok(2.0), Ok(2.1), Err("timeout".to_string()), Ok(1.9)];
    let channel = Arc::new(RecordingChannel::default());
    let mut p = pipeline(ScriptedSource::new(script), channel, HealthRegistry::new());

    p.tick().await.unwrap();
    p.tick().await.unwrap();
    let before = p.window().values();

    p.tick().await.unwrap();
    assert_eq!(p.window().values(), before);

    p.tick().await.unwrap();
    assert_eq!(p.window().values(), vec![2.0, 2.1, 1.9]);
}

#[tokio::test]
async fn test_undelivered_emergency_is_loud() {
    let channel = Arc::new(RecordingChannel::refusing(vec![Priority::Emergency]));
    let health = HealthRegistry::new();
    let mut p = pipeline(
        ScriptedSource::readings(&[2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]),
        channel,
        health.clone(),
    );

    for _ in 0..5 {
        p.tick().await.unwrap();
    }

    let err = p.tick().await.unwrap_err();
    match err {
        TickError::EmergencyUndelivered { decision, source } => {
            assert_eq!(decision, AlertDecision::SustainedLow);
            assert!(matches!(source, DeliveryError::Rejected { status: 500, .. }));
        }
    }
    assert_eq!(
        health.status_of(components::NOTIFIER).await,
        Some(ComponentStatus::Unhealthy)
    );

    // The reading was still recorded and the next tick retries
    assert_eq!(p.window().len(), 6);
    assert!(p.tick().await.is_err());
}

#[tokio::test]
async fn test_undelivered_status_notification_is_tolerated() {
    let script: Vec<Result<f64, String>> = (0..6).map(|_| Err("down".to_string())).collect();
    let channel = Arc::new(RecordingChannel::refusing(vec![Priority::Normal]));
    let health = HealthRegistry::new();
    let mut p = pipeline(ScriptedSource::new(script), channel, health.clone());

    for _ in 0..6 {
        assert!(p.tick().await.is_ok());
    }
    assert!(p.failures().is_escalated());
    assert_eq!(
        health.status_of(components::NOTIFIER).await,
        Some(ComponentStatus::Degraded)
    );
}

#[tokio::test]
async fn test_readings_forwarded_to_sink_and_watch() {
    let channel = Arc::new(RecordingChannel::default());
    let (tx, mut rx) = mpsc::channel(4);
    let mut p = pipeline(
        ScriptedSource::new(vec![Ok(5.4), Err("timeout".to_string()), Ok(5.8)]),
        channel,
        HealthRegistry::new(),
    )
    .with_sink(tx);
    let latest = p.subscribe_latest();

    for _ in 0..3 {
        p.tick().await.unwrap();
    }

    assert_eq!(rx.recv().await.unwrap().value, 5.4);
    assert_eq!(rx.recv().await.unwrap().value, 5.8);
    assert!(rx.try_recv().is_err());
    assert_eq!(latest.borrow().map(|r| r.value), Some(5.8));
}

#[tokio::test]
async fn test_full_sink_queue_does_not_block_tick() {
    let channel = Arc::new(RecordingChannel::default());
    let (tx, _rx) = mpsc::channel(1);
    let mut p = pipeline(
        ScriptedSource::readings(&[5.0, 5.1, 5.2]),
        channel,
        HealthRegistry::new(),
    )
    .with_sink(tx);

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(1), p.tick())
            .await
            .expect("tick should not wait on the sink")
            .unwrap();
    }
    assert_eq!(p.window().len(), 3);
}

#[tokio::test]
async fn test_start_sends_startup_heartbeat_with_reading() {
    let channel = Arc::new(RecordingChannel::default());
    let health = HealthRegistry::new();
    let p = pipeline(ScriptedSource::readings(&[6.2]), channel.clone(), health.clone());
    let mut monitor = MonitorLoop::new(p, Duration::from_secs(600));

    monitor.start().await.unwrap();

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Heartbeat");
    assert_eq!(sent[0].priority, Priority::Silent);
    assert!(sent[0].body.contains("6.2 mmol/L"));
    drop(sent);

    assert_eq!(monitor.tick_count(), 1);
    assert!(health.readiness().await.ready);
}

#[tokio::test]
async fn test_start_without_reading_still_announces() {
    let channel = Arc::new(RecordingChannel::default());
    let p = pipeline(
        ScriptedSource::new(vec![Err("login failed".to_string())]),
        channel.clone(),
        HealthRegistry::new(),
    );
    let mut monitor = MonitorLoop::new(p, Duration::from_secs(600));

    monitor.start().await.unwrap();
    assert_eq!(
        channel.sent.lock().unwrap()[0].body,
        "Scheduler started, no reading yet 🐦"
    );
}

#[tokio::test]
async fn test_start_fails_when_heartbeat_undeliverable() {
    let channel = Arc::new(RecordingChannel::refusing(vec![Priority::Silent]));
    let p = pipeline(ScriptedSource::readings(&[6.0]), channel, HealthRegistry::new());
    let mut monitor = MonitorLoop::new(p, Duration::from_secs(600));

    assert!(monitor.start().await.is_err());
}

#[tokio::test]
async fn test_heartbeat_quotes_latest_reading() {
    let channel = Arc::new(RecordingChannel::default());
    let mut p = pipeline(
        ScriptedSource::readings(&[7.1]),
        channel.clone(),
        HealthRegistry::new(),
    );
    let heartbeat = HeartbeatLoop::new(
        p.sender().clone(),
        chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        p.subscribe_latest(),
    );

    heartbeat.beat().await.unwrap();
    p.tick().await.unwrap();
    heartbeat.beat().await.unwrap();

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent[0].body, "Daily canary 🐦");
    assert_eq!(sent[1].body, "Daily canary 🐦 latest glucose reading 7.1 mmol/L");
}

#[tokio::test(start_paused = true)]
async fn test_loop_ticks_on_interval_until_shutdown() {
    let source = Arc::new(TimedSource::new(Vec::new()));
    let p = pipeline_with(
        source.clone(),
        Arc::new(RecordingChannel::default()),
        HealthRegistry::new(),
    );
    let monitor = MonitorLoop::new(p, Duration::from_secs(600));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(monitor.run(shutdown_rx));
    tokio::time::sleep(Duration::from_secs(600 * 3 + 1)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop should stop on shutdown")
        .unwrap();

    assert_eq!(source.starts(), vec![600, 1200, 1800]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_tick_never_overlaps_the_next() {
    // First fetch outlives two intervals
    let source = Arc::new(TimedSource::new(vec![Duration::from_secs(1500)]));
    let p = pipeline_with(
        source.clone(),
        Arc::new(RecordingChannel::default()),
        HealthRegistry::new(),
    );
    let monitor = MonitorLoop::new(p, Duration::from_secs(600));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(monitor.run(shutdown_rx));
    tokio::time::sleep(Duration::from_secs(3001)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    // One catch-up tick right after the slow one, then back on the 600s grid
    assert_eq!(source.starts(), vec![600, 2100, 2400, 3000]);

    let fetches = source.fetches.lock().unwrap().clone();
    for pair in fetches.windows(2) {
        assert!(pair[1].0 >= pair[0].1, "fetches overlapped: {:?}", fetches);
    }
}
