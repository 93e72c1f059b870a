//! # S3 / MinIO Provider
//!
//! [`ObjectStore`] over `rust-s3` with path-style addressing, which is what
//! MinIO expects behind a plain `http://host:port` endpoint.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tokio::io::AsyncWrite;
use tracing::debug;

use super::object_store::ObjectStore;
use super::{StorageError, StorageResult};

const HTTP_NOT_FOUND: u16 = 404;

/// S3-compatible object store client
#[derive(Clone)]
pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("region", &self.region)
            .field("credentials", &"***")
            .finish()
    }
}

impl S3ObjectStore {
    /// Build a client for a custom endpoint such as `http://minio:9000`
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> StorageResult<Self> {
        if endpoint.is_empty() {
            return Err(StorageError::configuration("object store endpoint is empty"));
        }
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::configuration(format!("invalid credentials: {e}")))?;

        Ok(Self {
            region: Region::Custom {
                region: region.to_string(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> StorageResult<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::configuration(format!("invalid bucket '{name}': {e}")))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StorageResult<()> {
        let handle = self.bucket(bucket)?;
        let mut writer = writer;

        match handle.get_object_to_writer(key, &mut writer).await {
            Ok(status) if (200..300).contains(&status) => {
                debug!(bucket = %bucket, key = %key, status = status, "Object fetched");
                Ok(())
            }
            Ok(HTTP_NOT_FOUND) | Err(S3Error::HttpFailWithBody(HTTP_NOT_FOUND, _)) => {
                Err(StorageError::not_found(bucket, key))
            }
            Ok(status) => Err(StorageError::transfer(
                bucket,
                key,
                format!("unexpected HTTP status {status}"),
            )),
            Err(e) => Err(StorageError::transfer(bucket, key, e.to_string())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "s3"
    }
}
