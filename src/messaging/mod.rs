//! # Messaging Module
//!
//! Broker plumbing for the worker: the pipe-delimited wire codec, the broker
//! connector with bounded connect retry, the result publisher, and the
//! RabbitMQ and in-memory providers behind the [`ChannelFactory`] seam.

pub mod codec;
pub mod connector;
pub mod errors;
pub mod providers;
pub mod publisher;
pub mod traits;
pub mod types;

pub use codec::{encode, parse, ExtractionResult, FormatError, WorkItem};
pub use connector::{BrokerConnection, BrokerConnector};
pub use errors::{MessagingError, MessagingResult};
pub use publisher::ResultPublisher;
pub use traits::{BrokerChannel, ChannelFactory};
pub use types::{AckMode, ConnectionState, Delivery, DeliveryStream, QueueSpec};
