//! Storage backend contracts.
//!
//! Every backend stores object bytes plus a metadata record under the same
//! caller-chosen key. Callers depend only on these traits; `localfs` is the
//! filesystem implementation.

use crate::models::Metadata;
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use std::{io, time::Duration};
use thiserror::Error;
use tokio::io::AsyncRead;

pub mod localfs;

pub use localfs::LocalfsBackend;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("metadata for `{key}` is unreadable: {reason}")]
    BadMetadata { key: String, reason: String },
    #[error("empty file")]
    FileEmpty,
    #[error("file too large (limit is {max_size} bytes)")]
    FileTooLarge { max_size: u64 },
    #[error("object `{0}` already exists")]
    AlreadyExists(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error("a delete key is required")]
    MissingDeleteKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Readable object content, owned by whoever holds it.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Per-upload parameters for [`StorageBackend::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Requested lifetime. Zero means none was requested.
    pub expiry: Duration,
    pub delete_key: String,
    pub access_key: String,
    pub src_ip: String,
    pub original_name: String,
}

/// Operations every storage implementation provides.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Remove data, then metadata. Stops at the first failure.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether object data is present. Failures other than absence are errors.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Stored metadata, without opening the data.
    async fn head(&self, key: &str) -> StorageResult<Metadata>;

    /// Metadata plus a reader positioned at the start of the data.
    async fn get(&self, key: &str) -> StorageResult<(Metadata, ObjectReader)>;

    /// Store a new object from `reader` and return its metadata.
    async fn put(
        &self,
        key: &str,
        reader: ObjectReader,
        options: PutOptions,
    ) -> StorageResult<Metadata>;

    /// Overwrite the metadata record only. The data is left untouched.
    async fn put_metadata(&self, key: &str, metadata: &Metadata) -> StorageResult<()>;

    /// Respond to `request` with the object bytes. Range and conditional
    /// handling belong to the response sink.
    async fn serve_file(&self, key: &str, request: Request<Body>) -> StorageResult<Response>;

    /// Length of the stored data as the storage layer reports it.
    async fn size(&self, key: &str) -> StorageResult<u64>;
}

/// Backends that can also enumerate every stored key.
#[async_trait]
pub trait MetaStorageBackend: StorageBackend {
    async fn list(&self) -> StorageResult<Vec<String>>;
}
