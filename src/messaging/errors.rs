//! # Messaging Error Types
//!
//! Structured error handling for the broker layer using thiserror instead of
//! `Box<dyn Error>` patterns.

use thiserror::Error;

/// Broker and queue error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Broker unreachable after {attempts} attempts: {last_error}")]
    ConnectionExhausted { attempts: u32, last_error: String },

    #[error("Broker connection is not open")]
    NotConnected,

    #[error("Queue declaration failed: {queue_name}: {message}")]
    QueueDeclaration { queue_name: String, message: String },

    #[error("Publish failed: {queue_name}: {message}")]
    Publish { queue_name: String, message: String },

    #[error("Subscribe failed: {queue_name}: {message}")]
    Subscribe { queue_name: String, message: String },

    #[error("Delivery failed: {queue_name}: {message}")]
    Delivery { queue_name: String, message: String },

    #[error("Ack failed: {queue_name}: delivery {delivery_tag}: {message}")]
    Ack {
        queue_name: String,
        delivery_tag: u64,
        message: String,
    },

    #[error("Close failed: {message}")]
    Close { message: String },

    #[error("Operation cancelled by shutdown: {operation}")]
    Cancelled { operation: String },
}

impl MessagingError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a connection exhausted error
    pub fn connection_exhausted(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::ConnectionExhausted {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Create a queue declaration error
    pub fn queue_declaration(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueDeclaration {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create a publish error
    pub fn publish(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create a subscribe error
    pub fn subscribe(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    /// Create an ack error
    pub fn ack(
        queue_name: impl Into<String>,
        delivery_tag: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::Ack {
            queue_name: queue_name.into(),
            delivery_tag,
            message: message.into(),
        }
    }

    /// Create a close error
    pub fn close(message: impl Into<String>) -> Self {
        Self::Close {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
