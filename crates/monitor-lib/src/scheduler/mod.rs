//! Tick scheduling for the glucose monitor
//!
//! The monitoring tick and the daily heartbeat run as two independent tokio
//! tasks. The tick pipeline (window, failure state) is owned by exactly one
//! task, so ticks never overlap: a tick that outlives its interval causes the
//! missed firings to be skipped.

mod heartbeat;
mod monitor_loop;
mod pipeline;
mod sender;

#[cfg(test)]
mod tests;

pub use heartbeat::{duration_until_next, HeartbeatLoop};
pub use monitor_loop::MonitorLoop;
pub use pipeline::{TickOutcome, TickPipeline};
pub use sender::AlertSender;

use std::time::Duration;

use chrono::NaiveTime;

use crate::alerting::{
    DEFAULT_ESCALATION_THRESHOLD, DEFAULT_EXAMINE_COUNT, DEFAULT_HIGH_THRESHOLD,
    DEFAULT_LOW_THRESHOLD,
};
use crate::error::ConfigError;

/// Default window capacity `W`
pub const DEFAULT_WINDOW_CAPACITY: usize = 6;

/// Default tick interval (10 minutes)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(600);

/// Engine tunables, fixed at process start
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    /// Local wall-clock time of the daily heartbeat
    pub heartbeat_at: NaiveTime,
    pub window_capacity: usize,
    pub examine_count: usize,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub escalation_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            heartbeat_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            examine_count: DEFAULT_EXAMINE_COUNT,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Reject tunables the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "TICK_INTERVAL_MINUTES",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.examine_count == 0 {
            return Err(ConfigError::Invalid {
                field: "EXAMINE_COUNT",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.examine_count > self.window_capacity {
            return Err(ConfigError::Invalid {
                field: "EXAMINE_COUNT",
                reason: format!(
                    "{} exceeds WINDOW_CAPACITY {}",
                    self.examine_count, self.window_capacity
                ),
            });
        }
        if !self.low_threshold.is_finite() {
            return Err(ConfigError::Invalid {
                field: "GLUCOSE_CRITICAL_LOW",
                reason: "must be a finite number".to_string(),
            });
        }
        if !self.high_threshold.is_finite() {
            return Err(ConfigError::Invalid {
                field: "GLUCOSE_CRITICAL_HIGH",
                reason: "must be a finite number".to_string(),
            });
        }
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::Invalid {
                field: "GLUCOSE_CRITICAL_LOW",
                reason: format!(
                    "{} must be below GLUCOSE_CRITICAL_HIGH {}",
                    self.low_threshold, self.high_threshold
                ),
            });
        }
        if self.escalation_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "ESCALATION_THRESHOLD",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
