//! Sustained high/low glucose detection
//!
//! Examines the last K readings of the window against fixed critical
//! thresholds. Comparisons are strict, so a reading equal to a threshold
//! never contributes to an alarm.

use super::AlertDecision;
use crate::window::SlidingWindow;

/// Default critical low threshold (mmol/L)
pub const DEFAULT_LOW_THRESHOLD: f64 = 3.5;

/// Default critical high threshold (mmol/L)
pub const DEFAULT_HIGH_THRESHOLD: f64 = 22.0;

/// Default number of readings to examine
pub const DEFAULT_EXAMINE_COUNT: usize = 6;

/// Detects sustained excursions outside the safe glucose range
#[derive(Debug, Clone)]
pub struct TrendDetector {
    /// Every examined reading must be strictly below this to alarm low
    pub low_threshold: f64,
    /// Every examined reading must be strictly above this to alarm high
    pub high_threshold: f64,
    /// Number of most recent readings examined (K)
    pub examine_count: usize,
}

impl TrendDetector {
    pub fn new(low_threshold: f64, high_threshold: f64, examine_count: usize) -> Self {
        Self {
            low_threshold,
            high_threshold,
            examine_count,
        }
    }

    /// Evaluate the window
    ///
    /// Returns `None` until the window holds at least K readings.
    pub fn evaluate(&self, window: &SlidingWindow) -> AlertDecision {
        let dataset = window.snapshot(self.examine_count);
        if dataset.is_empty() || dataset.len() < self.examine_count {
            return AlertDecision::None;
        }

        let all_below_minimum = dataset.iter().all(|r| r.value < self.low_threshold);
        let all_above_maximum = dataset.iter().all(|r| r.value > self.high_threshold);

        if all_below_minimum {
            AlertDecision::SustainedLow
        } else if all_above_maximum {
            AlertDecision::SustainedHigh
        } else {
            AlertDecision::None
        }
    }
}

impl Default for TrendDetector {
    fn default() -> Self {
        Self::new(
            DEFAULT_LOW_THRESHOLD,
            DEFAULT_HIGH_THRESHOLD,
            DEFAULT_EXAMINE_COUNT,
        )
    }
}
