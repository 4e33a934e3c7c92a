//! Optional time-series persistence of raw readings
//!
//! The tick pipeline never waits on persistence: readings are handed to a
//! bounded channel and written by a `SinkWorker` on its own task. When no
//! sink is configured the channel is simply never created.

mod influx;

pub use influx::{InfluxSettings, InfluxSink, GLUCOSE_MEASUREMENT};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::error::WriteError;
use crate::health::{components, HealthRegistry};
use crate::models::Reading;

/// Default capacity of the reading channel feeding the sink worker
pub const DEFAULT_SINK_BUFFER: usize = 64;

/// Trait for time-series persistence implementations
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Write a single timestamped point
    async fn write_point(
        &self,
        metric_name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), WriteError>;
}

/// Drains readings from the pipeline and writes them to the sink
pub struct SinkWorker {
    sink: Arc<dyn PersistenceSink>,
    readings_rx: mpsc::Receiver<Reading>,
    health: Option<HealthRegistry>,
}

impl SinkWorker {
    /// Create a worker and the sender the pipeline uses to feed it
    pub fn new(sink: Arc<dyn PersistenceSink>, buffer: usize) -> (Self, mpsc::Sender<Reading>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                sink,
                readings_rx: rx,
                health: None,
            },
            tx,
        )
    }

    /// Report write failures to the health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Write readings until the channel closes or shutdown is signalled
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting persistence sink worker");

        loop {
            tokio::select! {
                reading = self.readings_rx.recv() => {
                    match reading {
                        Some(reading) => self.write(&reading).await,
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down persistence sink worker");
                    break;
                }
            }
        }
    }

    async fn write(&self, reading: &Reading) {
        match self
            .sink
            .write_point(GLUCOSE_MEASUREMENT, reading.value, reading.observed_at)
            .await
        {
            Ok(()) => {
                debug!(value = reading.value, "Reading persisted");
                if let Some(health) = &self.health {
                    health.set_healthy(components::SINK).await;
                }
            }
            Err(e) => {
                warn!(error = %e, value = reading.value, "Failed to persist reading");
                if let Some(health) = &self.health {
                    health.set_degraded(components::SINK, e.to_string()).await;
                }
            }
        }
    }
}
