//! InfluxDB v2 persistence sink
//!
//! Writes points in line protocol to the `/api/v2/write` endpoint. The HTTP
//! client is rebuilt after a connection or timeout failure.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::PersistenceSink;
use crate::error::WriteError;

/// Measurement name for glucose readings
pub const GLUCOSE_MEASUREMENT: &str = "glucose";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for an InfluxDB v2 bucket
#[derive(Clone)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl std::fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("url", &self.url)
            .field("token", &"********")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Persistence sink writing to InfluxDB v2
pub struct InfluxSink {
    settings: InfluxSettings,
    client: RwLock<Client>,
}

impl InfluxSink {
    pub fn new(settings: InfluxSettings) -> Result<Self, WriteError> {
        let settings = InfluxSettings {
            url: settings.url.trim_end_matches('/').to_string(),
            ..settings
        };
        Ok(Self {
            client: RwLock::new(build_client()?),
            settings,
        })
    }

    pub fn settings(&self) -> &InfluxSettings {
        &self.settings
    }

    /// Line protocol for a single float field named `value`
    pub fn line_protocol(metric_name: &str, value: f64, timestamp: DateTime<Utc>) -> String {
        let nanos = timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| timestamp.timestamp_millis() * 1_000_000);
        format!(
            "{} value={} {}",
            escape_measurement(metric_name),
            format_float(value),
            nanos
        )
    }

    async fn reinitialise(&self) {
        match build_client() {
            Ok(client) => {
                *self.client.write().await = client;
                info!(url = %self.settings.url, "Re-initialised InfluxDB client after connection issue");
            }
            Err(e) => warn!(error = %e, "Failed to re-initialise InfluxDB client"),
        }
    }
}

#[async_trait]
impl PersistenceSink for InfluxSink {
    async fn write_point(
        &self,
        metric_name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), WriteError> {
        let client = self.client.read().await.clone();
        let url = format!("{}/api/v2/write", self.settings.url);

        let result = client
            .post(&url)
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.settings.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(Self::line_protocol(metric_name, value, timestamp))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err = WriteError::from(e);
                if err.is_connection_issue() {
                    self.reinitialise().await;
                }
                return Err(err);
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Status { status, body });
        }

        Ok(())
    }
}

fn build_client() -> Result<Client, WriteError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

/// Floats always carry a decimal point so Influx stores them as floats
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
