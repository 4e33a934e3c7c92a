//! Daily heartbeat ("canary")
//!
//! Sends a Silent notification once a day at a fixed local time so the
//! subject can tell the monitor is alive even when glucose is uneventful.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::sync::{broadcast, watch};
use tracing::info;

use super::AlertSender;
use crate::alerting::{AlertContext, AlertDecision, HeartbeatReason};
use crate::error::DeliveryError;
use crate::models::Reading;

/// Time from `now` until the next occurrence of `at`
///
/// If `at` is exactly now or already passed today, the next occurrence is
/// tomorrow.
pub fn duration_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    until(now, next_occurrence(now, at))
}

/// First occurrence of `at` strictly after `after`
fn next_occurrence(after: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = after.date().and_time(at);
    if today > after {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Target following the one that just fired
///
/// Counted from the fired target, not from the wake-up time, so a sleep that
/// ends slightly early cannot schedule a second beat for the same day.
fn next_after_beat(fired: NaiveDateTime, now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    next_occurrence(now.max(fired), at)
}

fn until(now: NaiveDateTime, target: NaiveDateTime) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Fires the scheduled heartbeat until shutdown
pub struct HeartbeatLoop {
    sender: AlertSender,
    at: NaiveTime,
    latest_rx: watch::Receiver<Option<Reading>>,
}

impl HeartbeatLoop {
    pub fn new(
        sender: AlertSender,
        at: NaiveTime,
        latest_rx: watch::Receiver<Option<Reading>>,
    ) -> Self {
        Self {
            sender,
            at,
            latest_rx,
        }
    }

    /// Send one scheduled heartbeat quoting the latest reading, if any
    pub async fn beat(&self) -> Result<(), DeliveryError> {
        let latest = self.latest_rx.borrow().map(|r| r.value);
        let result = self
            .sender
            .send(
                AlertDecision::Heartbeat,
                &AlertContext::for_heartbeat(HeartbeatReason::Scheduled, latest),
            )
            .await;
        self.sender.logger().log_heartbeat(result.is_ok());
        result
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(at = %self.at.format("%H:%M"), "Starting daily heartbeat loop");

        let mut target = next_occurrence(Local::now().naive_local(), self.at);

        loop {
            let wait = until(Local::now().naive_local(), target);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    // Failures are logged by the sender; the next beat is tomorrow
                    let _ = self.beat().await;
                    target = next_after_beat(target, Local::now().naive_local(), self.at);
                }
                _ = shutdown.recv() => {
                    info!("Shutting down heartbeat loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_later_today() {
        assert_eq!(
            duration_until_next(at(8, 0, 0), time(9, 0)),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_already_passed_rolls_to_tomorrow() {
        assert_eq!(
            duration_until_next(at(10, 0, 0), time(9, 0)),
            Duration::from_secs(23 * 3600)
        );
    }

    #[test]
    fn test_early_wake_does_not_repeat_the_beat() {
        let fired = at(9, 0, 0);
        let woke_early = fired - chrono::Duration::milliseconds(5);

        let next = next_after_beat(fired, woke_early, time(9, 0));

        assert_eq!(next, fired + chrono::Duration::days(1));
        assert!(until(woke_early, next) > Duration::from_secs(23 * 3600));
    }

    #[test]
    fn test_late_wake_skips_to_the_next_future_target() {
        let fired = at(9, 0, 0);
        let resumed = fired + chrono::Duration::days(2) + chrono::Duration::hours(1);

        let next = next_after_beat(fired, resumed, time(9, 0));

        assert_eq!(next, at(9, 0, 0) + chrono::Duration::days(3));
    }

    #[test]
    fn test_exactly_now_rolls_to_tomorrow() {
        assert_eq!(
            duration_until_next(at(9, 0, 0), time(9, 0)),
            Duration::from_secs(24 * 3600)
        );
    }
}
