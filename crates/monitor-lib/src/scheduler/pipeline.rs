//! The per-tick state machine
//!
//! One tick fetches a reading, updates failure accounting and the window,
//! evaluates the trend and dispatches whatever that produced. A failing
//! source never makes a tick fail; only an undelivered Emergency alarm does.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::{AlertSender, EngineConfig};
use crate::alerting::{AlertContext, AlertDecision, FailureTracker, TrendDetector};
use crate::error::TickError;
use crate::health::components;
use crate::models::Reading;
use crate::observability::MonitorMetrics;
use crate::source::ReadingSource;
use crate::window::SlidingWindow;

/// Terminal state of a tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A reading arrived and was evaluated
    Success {
        reading: Reading,
        decision: AlertDecision,
        /// The reading ended an escalated failure streak
        recovered: bool,
    },
    /// The source failed; the window was left untouched
    FailureHandled {
        message: String,
        consecutive_failures: u32,
        /// This failure crossed the escalation threshold
        escalated: bool,
    },
}

/// Owns the mutable monitoring state and runs ticks against it
pub struct TickPipeline {
    source: Arc<dyn ReadingSource>,
    sender: AlertSender,
    window: SlidingWindow,
    detector: TrendDetector,
    failures: FailureTracker,
    sink_tx: Option<mpsc::Sender<Reading>>,
    latest_tx: watch::Sender<Option<Reading>>,
    metrics: MonitorMetrics,
}

impl TickPipeline {
    pub fn new(config: &EngineConfig, source: Arc<dyn ReadingSource>, sender: AlertSender) -> Self {
        let (latest_tx, _) = watch::channel(None);
        Self {
            source,
            sender,
            window: SlidingWindow::new(config.window_capacity),
            detector: TrendDetector::new(
                config.low_threshold,
                config.high_threshold,
                config.examine_count,
            ),
            failures: FailureTracker::new(config.escalation_threshold),
            sink_tx: None,
            latest_tx,
            metrics: MonitorMetrics::new(),
        }
    }

    /// Hand every reading to a persistence worker
    pub fn with_sink(mut self, sink_tx: mpsc::Sender<Reading>) -> Self {
        self.sink_tx = Some(sink_tx);
        self
    }

    /// Follow the most recent reading from another task
    pub fn subscribe_latest(&self) -> watch::Receiver<Option<Reading>> {
        self.latest_tx.subscribe()
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    pub fn sender(&self) -> &AlertSender {
        &self.sender
    }

    /// Run one tick to completion
    pub async fn tick(&mut self) -> Result<TickOutcome, TickError> {
        match self.source.fetch_current().await {
            Ok(reading) => self.on_reading(reading).await,
            Err(e) => Ok(self.on_failure(e.to_string()).await),
        }
    }

    async fn on_reading(&mut self, reading: Reading) -> Result<TickOutcome, TickError> {
        let recovered = self.failures.record_success();
        self.metrics.record_reading(reading.value);
        self.sender.health().set_healthy(components::SOURCE).await;

        if recovered {
            // Non-emergency: failures are logged by the sender and tolerated
            let _ = self
                .sender
                .send(AlertDecision::SourceRecovered, &AlertContext::empty())
                .await;
        }

        self.window.push(reading);
        self.sender
            .logger()
            .log_reading(reading.value, &self.window.values());
        self.latest_tx.send_replace(Some(reading));
        self.forward_to_sink(reading);

        let decision = self.detector.evaluate(&self.window);
        if decision != AlertDecision::None {
            if let Err(source) = self
                .sender
                .send(decision, &AlertContext::for_reading(reading.value))
                .await
            {
                return Err(TickError::EmergencyUndelivered { decision, source });
            }
        }

        Ok(TickOutcome::Success {
            reading,
            decision,
            recovered,
        })
    }

    async fn on_failure(&mut self, message: String) -> TickOutcome {
        let escalated = self.failures.record_failure(message.clone());
        let consecutive = self.failures.consecutive_count();
        self.metrics.record_source_failure(consecutive);
        self.sender
            .logger()
            .log_source_failure(&message, consecutive, self.failures.is_escalated());

        let health = self.sender.health();
        if self.failures.is_escalated() {
            health
                .set_unhealthy(
                    components::SOURCE,
                    format!("{} consecutive failures: {}", consecutive, message),
                )
                .await;
        } else {
            health
                .set_degraded(
                    components::SOURCE,
                    format!("{} consecutive failures: {}", consecutive, message),
                )
                .await;
        }

        if escalated {
            let _ = self
                .sender
                .send(
                    AlertDecision::SourceDegraded,
                    &AlertContext::for_failure(message.clone()),
                )
                .await;
        }

        TickOutcome::FailureHandled {
            message,
            consecutive_failures: consecutive,
            escalated,
        }
    }

    fn forward_to_sink(&self, reading: Reading) {
        let Some(tx) = &self.sink_tx else {
            return;
        };
        match tx.try_send(reading) {
            Ok(()) => debug!(value = reading.value, "Reading queued for persistence"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(value = reading.value, "Persistence queue full, dropping reading")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(value = reading.value, "Persistence worker stopped, dropping reading")
            }
        }
    }
}
