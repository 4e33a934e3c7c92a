//! Error taxonomy for the monitor
//!
//! - `SourceError`: the upstream fetch failed. Transient, tracked by the
//!   failure tracker, never fatal.
//! - `DeliveryError`: the notification channel failed. Not retried here.
//! - `WriteError`: the optional time-series sink failed. Logged only.
//! - `ConfigError`: startup parameters are missing or inconsistent. Fatal.

use thiserror::Error;

use crate::alerting::AlertDecision;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("terms of use must be accepted in the LibreLinkUp app")]
    TermsNotAccepted,

    #[error("account has no patient connections")]
    NoConnections,

    #[error("connection has no current glucose measurement")]
    MissingMeasurement,

    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected ({status}): {errors}")]
    Rejected { status: u16, errors: String },

    #[error("failed to decode delivery response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("write rejected ({status}): {body}")]
    Status { status: u16, body: String },
}

impl WriteError {
    /// Connection-level failures that warrant rebuilding the client
    pub fn is_connection_issue(&self) -> bool {
        match self {
            WriteError::Http(e) => e.is_timeout() || e.is_connect(),
            WriteError::Status { .. } => false,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors that cross the tick boundary into the scheduler
#[derive(Debug, Error)]
pub enum TickError {
    #[error("emergency alarm {decision} could not be delivered: {source}")]
    EmergencyUndelivered {
        decision: AlertDecision,
        #[source]
        source: DeliveryError,
    },
}
