//! S3-compatible object storage (MinIO in development).

mod client;
mod filename;

pub use client::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_SIZE_MB, ObjectInfo, StorageClient};
pub use filename::random_filename;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key `{key}`: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("object `{0}` not found")]
    NotFound(String),

    #[error("object `{key}` is {size} bytes, larger than the {max_size_mb} MB limit")]
    TooLarge {
        key: String,
        size: usize,
        max_size_mb: usize,
    },

    #[error("failed to configure storage client: {0}")]
    Config(#[source] object_store::Error),

    #[error("failed to upload `{key}`: {source}")]
    Upload {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("streaming upload failed for `{key}`: {error}")]
    StreamUpload { key: String, error: String },

    #[error("failed to download `{key}`: {source}")]
    Download {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("failed to delete `{key}`: {source}")]
    Delete {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("failed to list objects under `{prefix}`: {source}")]
    List {
        prefix: String,
        #[source]
        source: object_store::Error,
    },
}
