//! Delivery with outcome accounting
//!
//! Wraps the `Dispatcher` so that every delivery attempt, from either the
//! tick pipeline or the heartbeat, updates metrics and notifier health the
//! same way.

use tracing::debug;

use crate::alerting::{AlertContext, AlertDecision, Dispatcher};
use crate::error::DeliveryError;
use crate::health::{components, HealthRegistry};
use crate::models::Priority;
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Dispatches decisions and records how delivery went
#[derive(Clone)]
pub struct AlertSender {
    dispatcher: Dispatcher,
    health: HealthRegistry,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl AlertSender {
    pub fn new(dispatcher: Dispatcher, health: HealthRegistry, logger: StructuredLogger) -> Self {
        Self {
            dispatcher,
            health,
            metrics: MonitorMetrics::new(),
            logger,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Deliver the notification for `decision`
    ///
    /// A failed Emergency delivery is logged at error level and marks the
    /// notifier unhealthy; other failures only degrade it. The error is
    /// returned either way so the caller decides whether it is fatal.
    pub async fn send(&self, decision: AlertDecision, ctx: &AlertContext) -> Result<(), DeliveryError> {
        let Some(priority) = Dispatcher::priority_for(decision) else {
            return Ok(());
        };

        match self.dispatcher.dispatch(decision, ctx).await {
            Ok(_) => {
                self.metrics.inc_alert_dispatched(decision);
                self.health.set_healthy(components::NOTIFIER).await;
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_delivery_failure(priority);
                if priority == Priority::Emergency {
                    self.logger
                        .log_emergency_undelivered(decision, &e.to_string());
                    self.health
                        .set_unhealthy(
                            components::NOTIFIER,
                            format!("{} alarm undelivered: {}", decision, e),
                        )
                        .await;
                } else {
                    debug!(decision = %decision, "Non-emergency delivery failure tolerated");
                    self.health
                        .set_degraded(components::NOTIFIER, e.to_string())
                        .await;
                }
                Err(e)
            }
        }
    }
}
