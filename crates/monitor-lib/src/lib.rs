//! Glucose trend detection and alerting engine
//!
//! This crate provides the core functionality for:
//! - Fetching CGM readings from LibreLinkUp
//! - Sliding-window trend detection (sustained low / high)
//! - Source failure escalation and recovery
//! - Notification dispatch through Pushover
//! - Optional persistence to InfluxDB
//! - Health checks and observability

pub mod alerting;
pub mod error;
pub mod health;
pub mod models;
pub mod notify;
pub mod observability;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod window;

pub use alerting::{AlertContext, AlertDecision, Dispatcher, FailureTracker, TrendDetector};
pub use error::{ConfigError, DeliveryError, SourceError, TickError, WriteError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use scheduler::{EngineConfig, HeartbeatLoop, MonitorLoop, TickOutcome, TickPipeline};
pub use window::SlidingWindow;
