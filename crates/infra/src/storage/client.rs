use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, TryStreamExt};
use object_store::{
    ObjectMeta, ObjectStore, PutPayload, WriteMultipart, aws::AmazonS3Builder, memory::InMemory,
    path::Path,
};
use serde::Serialize;
use tracing::{debug, error, info};

use launchpad_core::StorageSettings;

use super::StorageError;

pub const DEFAULT_MAX_SIZE_MB: usize = 25;
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// In-flight multipart parts per streaming upload.
const MAX_CONCURRENT_PARTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectMeta> for ObjectInfo {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.location.to_string(),
            size: meta.size as u64,
            last_modified: meta.last_modified,
        }
    }
}

/// Bucket-scoped object storage client.
#[derive(Debug, Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// S3 client for the configured MinIO endpoint (path-style requests).
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let endpoint = endpoint_url(settings);
        let store = AmazonS3Builder::new()
            .with_endpoint(&endpoint)
            .with_bucket_name(&settings.bucket_name)
            .with_region(&settings.region)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key)
            .with_allow_http(!settings.use_https)
            .build()
            .map_err(StorageError::Config)?;

        info!(endpoint = %endpoint, bucket = %settings.bucket_name, "object storage configured");
        Ok(Self::new(Arc::new(store), settings.bucket_name.clone()))
    }

    /// Process-local store (dev/test).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a whole object, refusing payloads over `max_size_mb`.
    pub async fn upload(&self, key: &str, data: Bytes, max_size_mb: usize) -> Result<(), StorageError> {
        let path = object_path(key)?;
        if data.len() > max_size_mb * 1024 * 1024 {
            return Err(StorageError::TooLarge {
                key: key.to_string(),
                size: data.len(),
                max_size_mb,
            });
        }

        let size = data.len();
        self.store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|source| StorageError::Upload {
                key: key.to_string(),
                source,
            })?;

        debug!(key, size, "object uploaded");
        Ok(())
    }

    /// Multipart upload fed from a byte stream, `chunk_size` bytes per part.
    ///
    /// The upload is aborted if the stream yields an error, exceeds
    /// `max_size` bytes, or a part fails. Returns the number of bytes written.
    pub async fn stream_upload<S, E>(
        &self,
        key: &str,
        stream: S,
        chunk_size: usize,
        max_size: Option<usize>,
    ) -> Result<usize, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display,
    {
        let path = object_path(key)?;
        let stream_err = |error: String| StorageError::StreamUpload {
            key: key.to_string(),
            error,
        };

        let upload = self
            .store
            .put_multipart(&path)
            .await
            .map_err(|e| stream_err(e.to_string()))?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, chunk_size);

        let mut stream = std::pin::pin!(stream);
        let mut total = 0usize;
        while let Some(chunk) = stream.next().await {
            let failure = match chunk {
                Ok(bytes) => {
                    total += bytes.len();
                    if let Some(max) = max_size.filter(|max| total > *max) {
                        Some(StorageError::TooLarge {
                            key: key.to_string(),
                            size: total,
                            max_size_mb: max / (1024 * 1024),
                        })
                    } else if let Err(e) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
                        Some(stream_err(e.to_string()))
                    } else {
                        writer.write(&bytes);
                        None
                    }
                }
                Err(e) => Some(stream_err(e.to_string())),
            };

            if let Some(err) = failure {
                if let Err(abort_err) = writer.abort().await {
                    error!(key, error = %abort_err, "failed to abort multipart upload");
                }
                return Err(err);
            }
        }

        writer
            .finish()
            .await
            .map_err(|e| stream_err(e.to_string()))?;

        debug!(key, size = total, "object stream-uploaded");
        Ok(total)
    }

    pub async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = object_path(key)?;
        let download_err = |source: object_store::Error| match source {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            source => StorageError::Download {
                key: key.to_string(),
                source,
            },
        };

        let result = self.store.get(&path).await.map_err(download_err)?;
        result.bytes().await.map_err(download_err)
    }

    /// Objects under `prefix` (a path prefix; matches whole segments).
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let prefix_path = match prefix.trim_matches('/') {
            "" => None,
            trimmed => Some(object_path(trimmed)?),
        };

        let metas: Vec<ObjectMeta> = self
            .store
            .list(prefix_path.as_ref())
            .try_collect()
            .await
            .map_err(|source| StorageError::List {
                prefix: prefix.to_string(),
                source,
            })?;

        Ok(metas.into_iter().map(ObjectInfo::from).collect())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = object_path(key)?;
        self.store.delete(&path).await.map_err(|source| {
            error!(key, error = %source, "failed to delete object");
            StorageError::Delete {
                key: key.to_string(),
                source,
            }
        })
    }

    /// Whether the backend answers a listing request.
    pub async fn status(&self) -> bool {
        match self.store.list(None).next().await {
            Some(Err(e)) => {
                debug!(error = %e, "storage status probe failed");
                false
            }
            _ => true,
        }
    }
}

fn endpoint_url(settings: &StorageSettings) -> String {
    let url = settings.public_url.trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        let scheme = if settings.use_https { "https" } else { "http" };
        format!("{scheme}://{url}")
    }
}

fn object_path(key: &str) -> Result<Path, StorageError> {
    let invalid = |reason: String| StorageError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.trim().is_empty() {
        return Err(invalid("key is empty".to_string()));
    }
    Path::parse(key).map_err(|e| invalid(e.to_string()))
}
