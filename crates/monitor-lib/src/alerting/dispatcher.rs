//! Notification dispatch for alert decisions
//!
//! Maps each decision to a titled, prioritized message and hands it to the
//! notification channel. Delivery errors are returned to the caller and are
//! never retried here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{AlertContext, AlertDecision, HeartbeatReason};
use crate::error::DeliveryError;
use crate::models::{NotificationMessage, Priority};
use crate::notify::NotificationChannel;

/// Seconds between acknowledgment requests for an alarm
pub const ALARM_RETRY_SECS: u32 = 30;

/// Seconds after which an unacknowledged alarm stops re-delivering
pub const ALARM_EXPIRE_SECS: u32 = 300;

pub const TITLE_LOW_ALARM: &str = "Extended Low Glucose Alarm";
pub const TITLE_HIGH_ALARM: &str = "Extended High Glucose Alarm";
pub const TITLE_SOURCE_DEGRADED: &str = "Monitoring disrupted";
pub const TITLE_SOURCE_RECOVERED: &str = "Error state cleared";
pub const TITLE_HEARTBEAT: &str = "Heartbeat";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns decisions into notifications
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn NotificationChannel>,
    /// Number of readings examined, quoted in alarm bodies
    examine_count: usize,
    /// Tick interval, quoted in alarm bodies
    tick_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        examine_count: usize,
        tick_interval: Duration,
    ) -> Self {
        Self {
            channel,
            examine_count,
            tick_interval,
        }
    }

    /// Delivery priority for a decision, `None` when nothing is sent
    pub fn priority_for(decision: AlertDecision) -> Option<Priority> {
        match decision {
            AlertDecision::None => None,
            AlertDecision::SustainedLow | AlertDecision::SustainedHigh => Some(Priority::Emergency),
            AlertDecision::SourceDegraded | AlertDecision::SourceRecovered => Some(Priority::Normal),
            AlertDecision::Heartbeat => Some(Priority::Silent),
        }
    }

    /// Build the message for a decision
    ///
    /// Returns `None` for `AlertDecision::None`.
    pub fn compose(&self, decision: AlertDecision, ctx: &AlertContext) -> Option<NotificationMessage> {
        let message = match decision {
            AlertDecision::None => return None,
            AlertDecision::SustainedLow => NotificationMessage::emergency(
                TITLE_LOW_ALARM,
                self.alarm_body(ctx),
                ALARM_RETRY_SECS,
                ALARM_EXPIRE_SECS,
            ),
            AlertDecision::SustainedHigh => NotificationMessage::emergency(
                TITLE_HIGH_ALARM,
                self.alarm_body(ctx),
                ALARM_RETRY_SECS,
                ALARM_EXPIRE_SECS,
            ),
            AlertDecision::SourceDegraded => NotificationMessage::quiet(
                TITLE_SOURCE_DEGRADED,
                format!(
                    "Monitoring disrupted due to consecutive errors. {}",
                    ctx.failure_message.as_deref().unwrap_or_default()
                )
                .trim_end()
                .to_string(),
                Priority::Normal,
            ),
            AlertDecision::SourceRecovered => NotificationMessage::quiet(
                TITLE_SOURCE_RECOVERED,
                "Error state cleared, monitoring resumed",
                Priority::Normal,
            ),
            AlertDecision::Heartbeat => NotificationMessage::quiet(
                TITLE_HEARTBEAT,
                heartbeat_body(ctx),
                Priority::Silent,
            ),
        };

        Some(message)
    }

    /// Compose and deliver the message for a decision
    ///
    /// Returns the delivered message, or `Ok(None)` when there was nothing to send.
    pub async fn dispatch(
        &self,
        decision: AlertDecision,
        ctx: &AlertContext,
    ) -> Result<Option<NotificationMessage>, DeliveryError> {
        let Some(message) = self.compose(decision, ctx) else {
            return Ok(None);
        };

        match self.channel.send(&message).await {
            Ok(()) => {
                info!(
                    event = "alert_dispatched",
                    decision = %decision,
                    priority = %message.priority,
                    title = %message.title,
                    body = %message.body,
                    "Notification delivered"
                );
                Ok(Some(message))
            }
            Err(e) => {
                warn!(
                    event = "delivery_failed",
                    decision = %decision,
                    priority = %message.priority,
                    error = %e,
                    "Notification delivery failed"
                );
                Err(e)
            }
        }
    }

    fn alarm_body(&self, ctx: &AlertContext) -> String {
        let reading = ctx
            .reading
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".to_string());

        format!(
            "{} {} mmol/L over last {} readings, {} min intervals.",
            ctx.occurred_at.format(TIMESTAMP_FORMAT),
            reading,
            self.examine_count,
            self.tick_interval.as_secs() / 60
        )
    }
}

fn heartbeat_body(ctx: &AlertContext) -> String {
    match (ctx.heartbeat, ctx.reading) {
        (HeartbeatReason::Startup, Some(v)) => {
            format!("Scheduler started, current glucose reading {} mmol/L 🐦", v)
        }
        (HeartbeatReason::Startup, None) => "Scheduler started, no reading yet 🐦".to_string(),
        (HeartbeatReason::Scheduled, Some(v)) => {
            format!("Daily canary 🐦 latest glucose reading {} mmol/L", v)
        }
        (HeartbeatReason::Scheduled, None) => "Daily canary 🐦".to_string(),
    }
}
