//! The [`Storage`] trait and its error type.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use picode_core::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage root unusable: {0}")]
    RootUnavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// An object body together with its exact size.
///
/// The length is taken from the same open handle the stream reads from, so
/// it always matches the number of bytes the stream yields.
pub struct SizedStream {
    pub content_length: u64,
    pub stream: ByteStream,
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::BadRequest(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Byte store addressed by image keys.
///
/// Keys are relative to the backend's root, see the crate documentation for
/// the layout. A completed `upload_with_key` is visible to readers all at
/// once: readers never observe a partially written object.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key`, replacing any previous object.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Whole object in memory.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Object as a chunk stream plus its length, for serving.
    async fn download_stream(&self, storage_key: &str) -> StorageResult<SizedStream>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// True only for regular files; directories do not count.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;
}
