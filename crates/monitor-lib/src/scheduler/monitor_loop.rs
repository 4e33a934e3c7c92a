//! Monitoring tick loop
//!
//! Drives the `TickPipeline` on a fixed interval until shutdown. The pipeline
//! is owned by this task, so a slow tick delays the next one instead of
//! running concurrently with it. After an overrun one catch-up tick runs
//! immediately, then the cadence returns to the original grid.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::TickPipeline;
use crate::alerting::{AlertContext, AlertDecision, HeartbeatReason};
use crate::error::{DeliveryError, TickError};
use crate::observability::MonitorMetrics;

/// Runs ticks on the configured cadence
pub struct MonitorLoop {
    pipeline: TickPipeline,
    tick_interval: Duration,
    metrics: MonitorMetrics,
    tick_count: u64,
}

impl MonitorLoop {
    pub fn new(pipeline: TickPipeline, tick_interval: Duration) -> Self {
        Self {
            pipeline,
            tick_interval,
            metrics: MonitorMetrics::new(),
            tick_count: 0,
        }
    }

    pub fn pipeline(&self) -> &TickPipeline {
        &self.pipeline
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Run the first tick immediately, then announce the monitor
    ///
    /// An error means the startup heartbeat could not be delivered; the
    /// process should not claim to be monitoring in that case.
    pub async fn start(&mut self) -> Result<(), DeliveryError> {
        self.run_tick().await;
        self.pipeline.sender().health().set_ready(true).await;

        let latest = self.pipeline.window().latest().map(|r| r.value);
        let result = self
            .pipeline
            .sender()
            .send(
                AlertDecision::Heartbeat,
                &AlertContext::for_heartbeat(HeartbeatReason::Startup, latest),
            )
            .await;
        self.pipeline.sender().logger().log_heartbeat(result.is_ok());
        result
    }

    /// Tick every interval until shutdown is signalled
    ///
    /// The first scheduled tick is one interval from now; `start` covers the
    /// immediate one.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.tick_interval.as_secs(),
            "Starting monitoring tick loop"
        );

        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick().await;
                    self.pipeline.sender().health().set_ready(true).await;
                }
                _ = shutdown.recv() => {
                    info!(ticks = self.tick_count, "Shutting down monitoring tick loop");
                    break;
                }
            }
        }
    }

    async fn run_tick(&mut self) {
        let start = Instant::now();
        let result = self.pipeline.tick().await;
        let elapsed = start.elapsed();

        self.tick_count += 1;
        self.metrics.observe_tick_duration(elapsed.as_secs_f64());

        match result {
            Ok(outcome) => {
                debug!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    outcome = ?outcome,
                    "Tick complete"
                );
            }
            Err(TickError::EmergencyUndelivered { decision, source }) => {
                error!(
                    tick = self.tick_count,
                    decision = %decision,
                    error = %source,
                    "Tick ended with an undelivered emergency alarm"
                );
            }
        }

        if elapsed > self.tick_interval {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                interval_secs = self.tick_interval.as_secs(),
                "Tick outlived its interval, missed firings collapsed into one"
            );
        }
    }
}
