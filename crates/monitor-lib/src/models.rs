//! Core data models for the glucose monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single glucose reading in mmol/L
///
/// Readings are immutable once created; arrival order is the order in which
/// they are pushed into the sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: f64, observed_at: DateTime<Utc>) -> Self {
        Self { value, observed_at }
    }

    /// Create a reading stamped with the current time
    pub fn now(value: f64) -> Self {
        Self::new(value, Utc::now())
    }
}

/// Delivery priority of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Informational, no device disruption
    Silent,
    /// Status change, no device disruption
    Normal,
    /// Alarm that is re-delivered until acknowledged or expired
    Emergency,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Silent => write!(f, "silent"),
            Priority::Normal => write!(f, "normal"),
            Priority::Emergency => write!(f, "emergency"),
        }
    }
}

/// A structured message handed to the notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// Seconds between re-delivery attempts (Emergency only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval_secs: Option<u32>,
    /// Seconds after which re-delivery stops (Emergency only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after_secs: Option<u32>,
}

impl NotificationMessage {
    /// A quiet message with no retry profile
    pub fn quiet(title: impl Into<String>, body: impl Into<String>, priority: Priority) -> Self {
        debug_assert!(priority != Priority::Emergency);
        Self {
            title: title.into(),
            body: body.into(),
            priority,
            retry_interval_secs: None,
            expire_after_secs: None,
        }
    }

    /// An acknowledgment-seeking alarm
    pub fn emergency(
        title: impl Into<String>,
        body: impl Into<String>,
        retry_interval_secs: u32,
        expire_after_secs: u32,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: Priority::Emergency,
            retry_interval_secs: Some(retry_interval_secs),
            expire_after_secs: Some(expire_after_secs),
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.priority == Priority::Emergency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_message_has_no_retry_profile() {
        let msg = NotificationMessage::quiet("Heartbeat", "Daily canary", Priority::Silent);
        assert_eq!(msg.retry_interval_secs, None);
        assert_eq!(msg.expire_after_secs, None);
        assert!(!msg.is_emergency());
    }

    #[test]
    fn test_emergency_message_carries_retry_profile() {
        let msg = NotificationMessage::emergency("Alarm", "low", 30, 300);
        assert_eq!(msg.priority, Priority::Emergency);
        assert_eq!(msg.retry_interval_secs, Some(30));
        assert_eq!(msg.expire_after_secs, Some(300));
    }

    #[test]
    fn test_priority_serializes_lowercase() {
        let json = serde_json::to_string(&Priority::Emergency).unwrap();
        assert_eq!(json, "\"emergency\"");
    }
}
