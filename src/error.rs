//! Top-level worker error type.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Broker unreachable at startup; the worker never subscribed
    #[error("Worker startup failed: {source}")]
    Startup { source: MessagingError },

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Object storage error: {0}")]
    Storage(#[from] StorageError),

    /// The broker closed the connection while the worker was running
    #[error("Broker connection lost while consuming from {queue}")]
    ConnectionLost { queue: String },
}

impl WorkerError {
    pub fn startup(source: MessagingError) -> Self {
        Self::Startup { source }
    }

    pub fn connection_lost(queue: impl Into<String>) -> Self {
        Self::ConnectionLost {
            queue: queue.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: WorkerError = MessagingError::NotConnected.into();
        assert!(matches!(err, WorkerError::Messaging(_)));

        let err: WorkerError = StorageError::not_found("documents", "k").into();
        assert!(err.to_string().contains("documents/k"));
    }

    #[test]
    fn test_startup_error_display() {
        let err = WorkerError::startup(MessagingError::connection_exhausted(5, "refused"));
        assert!(err.to_string().contains("after 5 attempts"));

        let err = WorkerError::connection_lost("document_queue");
        assert_eq!(
            err.to_string(),
            "Broker connection lost while consuming from document_queue"
        );
    }
}
