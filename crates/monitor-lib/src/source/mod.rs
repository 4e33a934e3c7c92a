//! Glucose reading sources
//!
//! A reading source returns the subject's current glucose value per call and
//! may fail with a `SourceError`. Failures are transient from the engine's
//! point of view and are accounted for by the failure tracker.

mod libre_link_up;

pub use libre_link_up::{
    LibreCredentials, LibreLinkUpSource, LibreOptions, DEFAULT_LIBRE_BASE_URL,
    DEFAULT_LIBRE_VERSION,
};

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::Reading;

/// Trait for reading source implementations
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Fetch the current glucose reading
    async fn fetch_current(&self) -> Result<Reading, SourceError>;
}
