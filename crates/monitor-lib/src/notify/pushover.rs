//! Pushover notification channel
//!
//! Emergency messages are sent with Pushover priority 2 and a retry/expire
//! profile so the service keeps re-delivering until acknowledged. Silent and
//! Normal messages are sent with priority -1 (no sound or vibration).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::NotificationChannel;
use crate::error::DeliveryError;
use crate::models::{NotificationMessage, Priority};

/// Pushover message endpoint
pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pushover application token and user key
#[derive(Clone)]
pub struct PushoverCredentials {
    pub user: String,
    pub token: String,
}

impl std::fmt::Debug for PushoverCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverCredentials")
            .field("user", &self.user)
            .field("token", &"********")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i32,
    #[serde(default)]
    errors: Vec<String>,
}

/// Delivers notifications through the Pushover API
pub struct PushoverChannel {
    client: Client,
    credentials: PushoverCredentials,
    api_url: String,
}

impl PushoverChannel {
    pub fn new(credentials: PushoverCredentials) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            credentials,
            api_url: PUSHOVER_API_URL.to_string(),
        })
    }

    /// Override the endpoint (used against local test servers)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Pushover priority code for a message priority
    pub fn priority_code(priority: Priority) -> i8 {
        match priority {
            Priority::Silent | Priority::Normal => -1,
            Priority::Emergency => 2,
        }
    }

    fn form_params(&self, message: &NotificationMessage) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("token", self.credentials.token.clone()),
            ("user", self.credentials.user.clone()),
            ("title", message.title.clone()),
            ("message", message.body.clone()),
            ("priority", Self::priority_code(message.priority).to_string()),
        ];

        if message.priority == Priority::Emergency {
            if let Some(retry) = message.retry_interval_secs {
                params.push(("retry", retry.to_string()));
            }
            if let Some(expire) = message.expire_after_secs {
                params.push(("expire", expire.to_string()));
            }
        }

        params
    }
}

#[async_trait]
impl NotificationChannel for PushoverChannel {
    async fn send(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&self.form_params(message))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: Option<PushoverResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let errors = parsed
                .map(|p| p.errors.join("; "))
                .filter(|e| !e.is_empty())
                .unwrap_or(body);
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                errors,
            });
        }

        match parsed {
            Some(p) if p.status == 1 => {
                debug!(title = %message.title, "Pushover accepted message");
                Ok(())
            }
            Some(p) => Err(DeliveryError::Rejected {
                status: status.as_u16(),
                errors: p.errors.join("; "),
            }),
            None => Err(DeliveryError::Decode(body)),
        }
    }
}
