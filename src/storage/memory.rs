//! In-memory [`ObjectStore`] for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::object_store::ObjectStore;
use super::{StorageError, StorageResult};

#[derive(Debug, Default)]
struct StoreInner {
    objects: HashMap<(String, String), Vec<u8>>,
    requests: Vec<String>,
    fail_transfers: bool,
}

/// Bucket/key map shared between clones
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
    }

    pub fn remove(&self, bucket: &str, key: &str) {
        self.inner
            .lock()
            .objects
            .remove(&(bucket.to_string(), key.to_string()));
    }

    /// Fail every transfer after writing a partial body
    pub fn fail_transfers(&self, enabled: bool) {
        self.inner.lock().fail_transfers = enabled;
    }

    /// Every `bucket/key` requested so far
    pub fn requests(&self) -> Vec<String> {
        self.inner.lock().requests.clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<()> {
        let (bytes, fail) = {
            let mut inner = self.inner.lock();
            inner.requests.push(format!("{bucket}/{key}"));
            let bytes = inner
                .objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned();
            (bytes, inner.fail_transfers)
        };

        let bytes = bytes.ok_or_else(|| StorageError::not_found(bucket, key))?;

        if fail {
            let partial = &bytes[..bytes.len() / 2];
            writer.write_all(partial).await?;
            return Err(StorageError::transfer(bucket, key, "connection reset by peer"));
        }

        writer.write_all(&bytes).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
