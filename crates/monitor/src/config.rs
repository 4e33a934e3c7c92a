//! Monitor configuration
//!
//! Values come from an optional config file, then the process environment
//! (a `.env` file is loaded into the environment first by `main`). Keys are
//! the upper-case environment names, lower-cased in files.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use monitor_lib::{
    error::ConfigError,
    notify::PushoverCredentials,
    scheduler::EngineConfig,
    sink::InfluxSettings,
    source::{LibreCredentials, LibreOptions},
};
use serde::Deserialize;
use tracing::warn;

/// Config file looked up when no path is given (any supported extension)
pub const DEFAULT_CONFIG_FILE: &str = "config/monitor";

const HEARTBEAT_FORMAT: &str = "%H:%M";

/// Raw monitor settings
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub libre_username: Option<String>,
    pub libre_password: Option<String>,
    pub libre_version: Option<String>,
    pub libre_region: Option<String>,

    pub pushover_user: Option<String>,
    pub pushover_token: Option<String>,

    pub influx_db_url: Option<String>,
    pub influx_db_token: Option<String>,
    pub influx_db_org: Option<String>,
    pub influx_db_bucket: Option<String>,

    #[serde(default = "default_tick_interval_minutes")]
    pub tick_interval_minutes: u64,

    /// Local `HH:MM` of the daily heartbeat
    #[serde(default = "default_heartbeat_at")]
    pub heartbeat_at: String,

    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    #[serde(default = "default_examine_count")]
    pub examine_count: usize,

    #[serde(default = "default_glucose_critical_low")]
    pub glucose_critical_low: f64,

    #[serde(default = "default_glucose_critical_high")]
    pub glucose_critical_high: f64,

    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,

    /// Port for health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_tick_interval_minutes() -> u64 {
    10
}

fn default_heartbeat_at() -> String {
    "09:00".to_string()
}

fn default_window_capacity() -> usize {
    6
}

fn default_examine_count() -> usize {
    6
}

fn default_glucose_critical_low() -> f64 {
    3.5
}

fn default_glucose_critical_high() -> f64 {
    22.0
}

fn default_escalation_threshold() -> u32 {
    6
}

fn default_api_port() -> u16 {
    8080
}

impl MonitorConfig {
    /// Load configuration from the config file and process environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_from(config_path, config::Environment::default())
    }

    /// Load configuration with an explicit environment source
    pub fn load_from(config_path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let file = match config_path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Check everything the monitor needs before it starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.libre_credentials()?;
        self.pushover_credentials()?;
        self.engine_config()?;
        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let heartbeat_at = NaiveTime::parse_from_str(self.heartbeat_at.trim(), HEARTBEAT_FORMAT)
            .map_err(|e| ConfigError::Invalid {
                field: "HEARTBEAT_AT",
                reason: format!("expected HH:MM, got {:?}: {}", self.heartbeat_at, e),
            })?;

        let engine = EngineConfig {
            tick_interval: Duration::from_secs(self.tick_interval_minutes.saturating_mul(60)),
            heartbeat_at,
            window_capacity: self.window_capacity,
            examine_count: self.examine_count,
            low_threshold: self.glucose_critical_low,
            high_threshold: self.glucose_critical_high,
            escalation_threshold: self.escalation_threshold,
        };
        engine.validate()?;
        Ok(engine)
    }

    pub fn libre_credentials(&self) -> Result<LibreCredentials, ConfigError> {
        Ok(LibreCredentials {
            username: required(&self.libre_username, "LIBRE_USERNAME")?,
            password: required(&self.libre_password, "LIBRE_PASSWORD")?,
        })
    }

    pub fn libre_options(&self) -> LibreOptions {
        LibreOptions::for_region(
            present(&self.libre_region).as_deref(),
            present(&self.libre_version).as_deref(),
        )
    }

    pub fn pushover_credentials(&self) -> Result<PushoverCredentials, ConfigError> {
        Ok(PushoverCredentials {
            user: required(&self.pushover_user, "PUSHOVER_USER")?,
            token: required(&self.pushover_token, "PUSHOVER_TOKEN")?,
        })
    }

    /// InfluxDB settings, only when all four values are set
    pub fn influx_settings(&self) -> Option<InfluxSettings> {
        let fields = [
            ("INFLUX_DB_URL", present(&self.influx_db_url)),
            ("INFLUX_DB_TOKEN", present(&self.influx_db_token)),
            ("INFLUX_DB_ORG", present(&self.influx_db_org)),
            ("INFLUX_DB_BUCKET", present(&self.influx_db_bucket)),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

        match missing.len() {
            0 => {
                let [url, token, org, bucket] = fields.map(|(_, value)| value.unwrap_or_default());
                Some(InfluxSettings {
                    url,
                    token,
                    org,
                    bucket,
                })
            }
            4 => None,
            _ => {
                warn!(missing = ?missing, "Incomplete InfluxDB configuration, persistence disabled");
                None
            }
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .cloned()
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing(field))
}
