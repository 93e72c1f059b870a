//! # Messaging Types
//!
//! Provider-agnostic types shared by the broker connector and its providers.

use std::fmt;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::MessagingError;

/// Lifecycle of the broker connection owned by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Queue declaration parameters
///
/// Both well-known queues are declared non-durable, non-exclusive, without
/// auto-delete and without extra arguments, which makes repeated declaration
/// with the same spec a no-op on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueSpec {
    /// Transient queue with the properties used by the upload side
    pub fn transient(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            exclusive: false,
            auto_delete: false,
        }
    }
}

/// How inbound deliveries are acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Broker considers the message delivered as soon as it is sent to us.
    /// A crash between delivery and publish loses the item.
    #[default]
    Auto,
    /// Ack after the handler returns; a crash mid-processing leads to redelivery.
    AfterProcessing,
}

impl AckMode {
    /// Value for the AMQP `no_ack` consume flag
    pub fn broker_acks_on_delivery(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

/// A message delivered by the broker to our consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

/// Stream of deliveries for one consumer. Ends when the broker closes the channel.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessagingError>> + Send>>;
