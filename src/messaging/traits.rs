//! # Broker Traits
//!
//! Provider-agnostic seams for the broker. RabbitMQ (`lapin`) and the in-memory
//! provider both implement these, so the connector and the worker never see a
//! concrete client type.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{DeliveryStream, QueueSpec};
use super::MessagingError;

/// An open broker channel
///
/// One connection and one channel per worker process. The channel is shared by
/// the consumer loop and the result publisher; message handling is serialized,
/// so implementations only need to be `Send + Sync`, not re-entrant under load.
#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    /// Declare a queue. Must succeed when the queue already exists with the same spec.
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), MessagingError>;

    /// Publish to the default exchange with routing key = queue name.
    /// Fire-and-forget: no publisher confirms are awaited.
    async fn publish(&self, queue_name: &str, payload: &[u8]) -> Result<(), MessagingError>;

    /// Register a consumer on a queue
    ///
    /// When `no_ack` is true the broker treats each message as acknowledged
    /// as soon as it is delivered.
    async fn subscribe(
        &self,
        queue_name: &str,
        consumer_tag: &str,
        no_ack: bool,
    ) -> Result<DeliveryStream, MessagingError>;

    /// Acknowledge a delivery (only meaningful for manual-ack consumers)
    async fn ack(&self, queue_name: &str, delivery_tag: u64) -> Result<(), MessagingError>;

    /// Whether both the channel and its connection are still open
    fn is_open(&self) -> bool;

    /// Close the channel, then the connection. Closing something already closed is not an error.
    async fn close(&self) -> Result<(), MessagingError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Opens fresh broker channels
///
/// Every call opens a brand new connection and channel; nothing from a failed
/// attempt is reused.
#[async_trait]
pub trait ChannelFactory: Send + Sync + 'static {
    async fn open(&self) -> Result<Arc<dyn BrokerChannel>, MessagingError>;

    /// Endpoint description safe for logs (no credentials)
    fn endpoint(&self) -> String;
}
