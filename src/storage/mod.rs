//! Object store gateway.
//!
//! Durable blob storage addressed by hierarchical keys. The poller and the
//! clip pipeline only ever need put, existence-check, and prefix-listing,
//! so that is the whole trait surface.

pub mod keys;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage upload failed for key {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("storage request failed: {0}")]
    Request(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Put / existence-check / prefix-listing over a blob store.
///
/// `exists` distinguishes "the object is not there" (`Ok(false)`) from a
/// failing storage layer (`Err`); the poller depends on that distinction.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Keys under `prefix`, in the store's listing order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}
