//! Push notification delivery
//!
//! The engine hands structured messages to a `NotificationChannel`. Delivery
//! is a blocking call that either succeeds or returns a `DeliveryError`;
//! re-delivery of Emergency messages is the channel's responsibility.

mod pushover;

pub use pushover::{PushoverChannel, PushoverCredentials, PUSHOVER_API_URL};

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::models::NotificationMessage;

/// Trait for notification delivery implementations
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver a single message
    async fn send(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}
