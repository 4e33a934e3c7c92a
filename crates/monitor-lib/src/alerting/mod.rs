//! Alert decisions for glucose trends and source health
//!
//! This module provides:
//! - Sustained high/low detection over the sliding window
//! - Consecutive source failure tracking with escalation and recovery
//! - Mapping of decisions to prioritized notifications

mod dispatcher;
mod failure_tracker;
mod trend_detector;

pub use dispatcher::{
    Dispatcher, ALARM_EXPIRE_SECS, ALARM_RETRY_SECS, TITLE_HEARTBEAT, TITLE_HIGH_ALARM,
    TITLE_LOW_ALARM, TITLE_SOURCE_DEGRADED, TITLE_SOURCE_RECOVERED,
};
pub use failure_tracker::{FailureState, FailureTracker, DEFAULT_ESCALATION_THRESHOLD};
pub use trend_detector::{
    TrendDetector, DEFAULT_EXAMINE_COUNT, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD,
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Outcome of a single evaluation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertDecision {
    None,
    SustainedLow,
    SustainedHigh,
    SourceDegraded,
    SourceRecovered,
    Heartbeat,
}

impl AlertDecision {
    /// Metric label for this decision
    pub fn as_label(&self) -> &'static str {
        match self {
            AlertDecision::None => "none",
            AlertDecision::SustainedLow => "sustained_low",
            AlertDecision::SustainedHigh => "sustained_high",
            AlertDecision::SourceDegraded => "source_degraded",
            AlertDecision::SourceRecovered => "source_recovered",
            AlertDecision::Heartbeat => "heartbeat",
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, AlertDecision::SustainedLow | AlertDecision::SustainedHigh)
    }
}

impl std::fmt::Display for AlertDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertDecision::None => write!(f, "None"),
            AlertDecision::SustainedLow => write!(f, "SustainedLow"),
            AlertDecision::SustainedHigh => write!(f, "SustainedHigh"),
            AlertDecision::SourceDegraded => write!(f, "SourceDegraded"),
            AlertDecision::SourceRecovered => write!(f, "SourceRecovered"),
            AlertDecision::Heartbeat => write!(f, "Heartbeat"),
        }
    }
}

/// Why a heartbeat is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatReason {
    Startup,
    Scheduled,
}

/// Data that accompanies a decision into the dispatcher
#[derive(Debug, Clone)]
pub struct AlertContext {
    /// Triggering (or latest known) reading in mmol/L
    pub reading: Option<f64>,
    /// Last source failure message
    pub failure_message: Option<String>,
    pub heartbeat: HeartbeatReason,
    pub occurred_at: DateTime<Local>,
}

impl AlertContext {
    pub fn for_reading(value: f64) -> Self {
        Self {
            reading: Some(value),
            failure_message: None,
            heartbeat: HeartbeatReason::Scheduled,
            occurred_at: Local::now(),
        }
    }

    pub fn for_failure(message: impl Into<String>) -> Self {
        Self {
            reading: None,
            failure_message: Some(message.into()),
            heartbeat: HeartbeatReason::Scheduled,
            occurred_at: Local::now(),
        }
    }

    pub fn for_heartbeat(reason: HeartbeatReason, latest: Option<f64>) -> Self {
        Self {
            reading: latest,
            failure_message: None,
            heartbeat: reason,
            occurred_at: Local::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            reading: None,
            failure_message: None,
            heartbeat: HeartbeatReason::Scheduled,
            occurred_at: Local::now(),
        }
    }

    /// Override the timestamp used in message bodies
    pub fn at(mut self, occurred_at: DateTime<Local>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}
