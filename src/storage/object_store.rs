//! Object store seam and the fetch-to-temp-file client.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::temp::TempResource;
use super::{StorageError, StorageResult};
use crate::constants::storage::DOCUMENT_TEMP_PREFIX;

/// Read access to an object-storage service
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Stream `bucket/key` into `writer`
    ///
    /// Returns [`StorageError::NotFound`] when the object does not exist.
    /// Implementations never retry.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<()>;

    fn provider_name(&self) -> &'static str;
}

/// Fetches objects from one bucket into scoped temporary files
#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    temp_dir: Option<PathBuf>,
    key_suffix: Option<String>,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("provider", &self.store.provider_name())
            .field("bucket", &self.bucket)
            .field("temp_dir", &self.temp_dir)
            .field("key_suffix", &self.key_suffix)
            .finish()
    }
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            temp_dir: None,
            key_suffix: None,
        }
    }

    /// Create temp files in `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Append `suffix` to every key before fetching (e.g. `.pdf`)
    pub fn with_key_suffix(mut self, suffix: Option<String>) -> Self {
        self.key_suffix = suffix.filter(|s| !s.is_empty());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// The key actually requested from the store for `object_key`
    pub fn resolve_key(&self, object_key: &str) -> String {
        match &self.key_suffix {
            Some(suffix) => format!("{object_key}{suffix}"),
            None => object_key.to_string(),
        }
    }

    /// Download `object_key` into a new uniquely named temp file
    ///
    /// On failure the partially written file is deleted before returning.
    pub async fn fetch(&self, object_key: &str) -> StorageResult<TempResource> {
        let key = self.resolve_key(object_key);
        let started = Instant::now();

        let (resource, file) = TempResource::create(self.temp_dir(), DOCUMENT_TEMP_PREFIX, "")
            .map_err(|e| StorageError::temp_file(format!("cannot create download file: {e}")))?;
        let mut file = tokio::fs::File::from_std(file);

        debug!(
            bucket = %self.bucket,
            key = %key,
            path = %resource.path().display(),
            "Downloading object"
        );

        self.store.get_object(&self.bucket, &key, &mut file).await?;
        file.flush().await?;
        let size_bytes = file.metadata().await?.len();
        drop(file);

        info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size_bytes,
            duration_ms = started.elapsed().as_millis() as u64,
            path = %resource.path().display(),
            "Successfully downloaded object"
        );

        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStore;

    fn client(store: &InMemoryObjectStore, dir: &Path) -> ObjectStoreClient {
        ObjectStoreClient::new(Arc::new(store.clone()), "documents")
            .with_temp_dir(Some(dir.to_path_buf()))
    }

    #[tokio::test]
    async fn test_fetch_writes_object_to_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        store.put("documents", "K", b"%PDF-1.7 fake");

        let resource = client(&store, dir.path()).fetch("K").await.unwrap();

        assert_eq!(std::fs::read(resource.path()).unwrap(), b"%PDF-1.7 fake");
        assert!(resource
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(DOCUMENT_TEMP_PREFIX));
    }

    #[tokio::test]
    async fn test_fetch_not_found_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();

        let err = client(&store, dir.path()).fetch("missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_transfer_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        store.put("documents", "K", b"data");
        store.fail_transfers(true);

        let err = client(&store, dir.path()).fetch("K").await.unwrap_err();

        assert!(matches!(err, StorageError::Transfer { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_key_suffix_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        store.put("documents", "K.pdf", b"data");

        let client = client(&store, dir.path()).with_key_suffix(Some(".pdf".to_string()));
        assert_eq!(client.resolve_key("K"), "K.pdf");
        assert!(client.fetch("K").await.is_ok());
        assert_eq!(store.requests(), vec!["documents/K.pdf".to_string()]);
    }

    #[test]
    fn test_empty_suffix_is_ignored() {
        let store = InMemoryObjectStore::new();
        let client = ObjectStoreClient::new(Arc::new(store), "documents")
            .with_key_suffix(Some(String::new()));
        assert_eq!(client.resolve_key("K"), "K");
    }
}
