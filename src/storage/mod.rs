//! # Object Storage
//!
//! Fetches uploaded document binaries from an S3-compatible bucket into scoped
//! temporary files. The [`ObjectStore`] trait is the provider seam; MinIO/S3
//! (`rust-s3`) and an in-memory store implement it.

pub mod memory;
pub mod object_store;
pub mod s3;
pub mod temp;

pub use memory::InMemoryObjectStore;
pub use object_store::{ObjectStore, ObjectStoreClient};
pub use s3::S3ObjectStore;
pub use temp::TempResource;

use thiserror::Error;

/// Object storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Object transfer failed: {bucket}/{key}: {message}")]
    Transfer {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Temporary file error: {message}")]
    TempFile { message: String },

    #[error("Object store configuration error: {message}")]
    Configuration { message: String },
}

impl StorageError {
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn transfer(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn temp_file(message: impl Into<String>) -> Self {
        Self::TempFile {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::temp_file(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
