//! Consecutive source failure tracking
//!
//! Escalation fires once per unbroken failure streak, when the streak reaches
//! the escalation threshold. Recovery fires on the first success after an
//! escalated streak; a streak that never escalated resets silently.

use serde::Serialize;

/// Default number of consecutive failures before escalation
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 6;

/// Snapshot of the failure streak
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureState {
    pub consecutive_count: u32,
    pub last_error_message: String,
    pub escalated: bool,
}

/// Tracks consecutive reading source failures
#[derive(Debug, Clone)]
pub struct FailureTracker {
    state: FailureState,
    escalation_threshold: u32,
}

impl FailureTracker {
    /// Create a tracker escalating at `escalation_threshold` failures
    ///
    /// A threshold of zero is clamped to one.
    pub fn new(escalation_threshold: u32) -> Self {
        Self {
            state: FailureState::default(),
            escalation_threshold: escalation_threshold.max(1),
        }
    }

    /// Record a failed fetch
    ///
    /// Returns true when this failure escalates the streak.
    pub fn record_failure(&mut self, message: impl Into<String>) -> bool {
        self.state.consecutive_count = self.state.consecutive_count.saturating_add(1);
        self.state.last_error_message = message.into();

        if !self.state.escalated && self.state.consecutive_count == self.escalation_threshold {
            self.state.escalated = true;
            return true;
        }

        false
    }

    /// Record a successful fetch
    ///
    /// Returns true when an escalated streak has just ended.
    pub fn record_success(&mut self) -> bool {
        let recovered = self.state.escalated;
        self.state.consecutive_count = 0;
        self.state.escalated = false;
        self.state.last_error_message.clear();
        recovered
    }

    pub fn state(&self) -> &FailureState {
        &self.state
    }

    pub fn consecutive_count(&self) -> u32 {
        self.state.consecutive_count
    }

    pub fn is_escalated(&self) -> bool {
        self.state.escalated
    }

    pub fn escalation_threshold(&self) -> u32 {
        self.escalation_threshold
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ESCALATION_THRESHOLD)
    }
}
