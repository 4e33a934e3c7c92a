//! Send a test notification

use anyhow::{Context, Result};
use clap::ValueEnum;
use monitor_lib::{
    alerting::{ALARM_EXPIRE_SECS, ALARM_RETRY_SECS},
    models::{NotificationMessage, Priority},
    notify::{NotificationChannel, PushoverChannel, PushoverCredentials},
};

use crate::output::{print_json, print_success, print_warning, OutputFormat};

/// Priority as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Silent,
    Normal,
    Emergency,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Silent => Priority::Silent,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::Emergency => Priority::Emergency,
        }
    }
}

/// Build the message the monitor would send at this priority
pub fn test_message(priority: Priority, title: String, body: String) -> NotificationMessage {
    match priority {
        Priority::Emergency => {
            NotificationMessage::emergency(title, body, ALARM_RETRY_SECS, ALARM_EXPIRE_SECS)
        }
        _ => NotificationMessage::quiet(title, body, priority),
    }
}

pub async fn send_test(
    user: String,
    token: String,
    priority: Priority,
    title: String,
    body: String,
    format: OutputFormat,
) -> Result<()> {
    let channel = PushoverChannel::new(PushoverCredentials { user, token })
        .context("Failed to create Pushover client")?;
    let message = test_message(priority, title, body);

    if message.is_emergency() {
        print_warning(&format!(
            "Emergency priority repeats every {}s until acknowledged (up to {}s)",
            ALARM_RETRY_SECS, ALARM_EXPIRE_SECS
        ));
    }

    channel
        .send(&message)
        .await
        .context("Pushover rejected the notification")?;

    match format {
        OutputFormat::Json => print_json(&message)?,
        OutputFormat::Table => print_success(&format!(
            "Sent {} notification \"{}\"",
            message.priority, message.title
        )),
    }

    Ok(())
}
