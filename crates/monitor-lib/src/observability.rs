//! Observability infrastructure for the glucose monitor
//!
//! Provides:
//! - Prometheus metrics (latest reading, fetch failures, alerts, tick latency)
//! - Structured JSON event logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

use crate::alerting::AlertDecision;
use crate::models::Priority;

/// Histogram buckets for tick duration (seconds); ticks are dominated by HTTP calls
const TICK_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    latest_reading_mmol: Gauge,
    readings_total: IntCounter,
    source_failures_total: IntCounter,
    consecutive_failures: IntGauge,
    alerts_dispatched_total: IntCounterVec,
    delivery_failures_total: IntCounterVec,
    tick_duration_seconds: Histogram,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            latest_reading_mmol: register_gauge!(
                "glucose_monitor_latest_reading_mmol",
                "Most recent glucose reading in mmol/L"
            )
            .expect("Failed to register latest_reading_mmol"),

            readings_total: register_int_counter!(
                "glucose_monitor_readings_total",
                "Total number of readings received from the source"
            )
            .expect("Failed to register readings_total"),

            source_failures_total: register_int_counter!(
                "glucose_monitor_source_failures_total",
                "Total number of failed reading fetches"
            )
            .expect("Failed to register source_failures_total"),

            consecutive_failures: register_int_gauge!(
                "glucose_monitor_consecutive_failures",
                "Length of the current source failure streak"
            )
            .expect("Failed to register consecutive_failures"),

            alerts_dispatched_total: register_int_counter_vec!(
                "glucose_monitor_alerts_dispatched_total",
                "Notifications delivered, by decision",
                &["decision"]
            )
            .expect("Failed to register alerts_dispatched_total"),

            delivery_failures_total: register_int_counter_vec!(
                "glucose_monitor_delivery_failures_total",
                "Notifications that could not be delivered, by priority",
                &["priority"]
            )
            .expect("Failed to register delivery_failures_total"),

            tick_duration_seconds: register_histogram!(
                "glucose_monitor_tick_duration_seconds",
                "Wall time of one monitoring tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),
        }
    }
}

/// Handle to the process-wide monitor metrics
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn record_reading(&self, value: f64) {
        self.inner().latest_reading_mmol.set(value);
        self.inner().readings_total.inc();
        self.inner().consecutive_failures.set(0);
    }

    pub fn record_source_failure(&self, consecutive: u32) {
        self.inner().source_failures_total.inc();
        self.inner().consecutive_failures.set(i64::from(consecutive));
    }

    pub fn inc_alert_dispatched(&self, decision: AlertDecision) {
        self.inner()
            .alerts_dispatched_total
            .with_label_values(&[decision.as_label()])
            .inc();
    }

    pub fn inc_delivery_failure(&self, priority: Priority) {
        self.inner()
            .delivery_failures_total
            .with_label_values(&[&priority.to_string()])
            .inc();
    }

    pub fn observe_tick_duration(&self, duration_secs: f64) {
        self.inner().tick_duration_seconds.observe(duration_secs);
    }
}

/// Structured logger for monitor events
///
/// Every event carries a stable `event` field for log queries.
#[derive(Clone)]
pub struct StructuredLogger {
    subject: String,
}

impl StructuredLogger {
    /// `subject` identifies the monitored account (never a credential)
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn log_startup(&self, version: &str, tick_interval_secs: u64, password_len: usize) {
        info!(
            event = "monitor_started",
            subject = %self.subject,
            version = %version,
            tick_interval_secs = tick_interval_secs,
            password = %format!("********* ({})", password_len),
            "Glucose monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            subject = %self.subject,
            reason = %reason,
            "Glucose monitor shutting down"
        );
    }

    pub fn log_reading(&self, value: f64, window: &[f64]) {
        info!(
            event = "reading_received",
            subject = %self.subject,
            value = value,
            window = ?window,
            "Glucose reading received: {} mmol/L",
            value
        );
    }

    pub fn log_source_failure(&self, message: &str, consecutive: u32, escalated: bool) {
        warn!(
            event = "source_failure",
            subject = %self.subject,
            error = %message,
            consecutive_failures = consecutive,
            escalated = escalated,
            "Reading source failed"
        );
    }

    /// An Emergency alarm was lost; always logged at error level
    pub fn log_emergency_undelivered(&self, decision: AlertDecision, error_message: &str) {
        error!(
            event = "emergency_delivery_failed",
            subject = %self.subject,
            decision = %decision,
            error = %error_message,
            "EMERGENCY ALARM COULD NOT BE DELIVERED"
        );
    }

    pub fn log_heartbeat(&self, delivered: bool) {
        if delivered {
            info!(event = "heartbeat_sent", subject = %self.subject, "Heartbeat delivered");
        } else {
            warn!(event = "heartbeat_sent", subject = %self.subject, delivered = false, "Heartbeat not delivered");
        }
    }
}
