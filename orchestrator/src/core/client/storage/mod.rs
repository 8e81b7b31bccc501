pub mod error;
pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use error::StorageError;

/// Trait defining object storage operations
///
/// A client is bound to one bucket. Keys are flat strings; "directories" are key prefixes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Get the object stored under `key`
    async fn get_data(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Store `data` under `key`, replacing any existing object
    async fn put_data(&self, data: Bytes, key: &str) -> Result<(), StorageError>;

    /// Delete the object under `key`
    async fn delete_data(&self, key: &str) -> Result<(), StorageError>;

    /// List every key starting with `dir_path`
    async fn list_files_in_dir(&self, dir_path: &str) -> Result<Vec<String>, StorageError>;

    /// A client for `bucket` sharing this client's connection settings
    fn with_bucket(&self, bucket: &str) -> Arc<dyn StorageClient>;

    fn bucket(&self) -> &str;
}
