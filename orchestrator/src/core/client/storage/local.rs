use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::Builder;

use crate::core::client::storage::{StorageClient, StorageError};

/// Prefix of the temporary files objects are written through. They are never listed.
const PARTIAL_PREFIX: &str = ".partial-";

/// Directory backed object storage. Objects live at `{root}/{bucket}/{key}`.
///
/// Meant for single host runs where every task shares the orchestrator's filesystem.
#[derive(Clone, Debug)]
pub struct LocalFsStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalFsStorage {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self { root: root.into(), bucket: bucket.into() }
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_dir().join(relative))
    }

    /// Recursively collects keys below `dir`, using `/` as separator regardless of platform.
    async fn collect_keys(&self, dir: PathBuf, keys: &mut Vec<String>) -> Result<(), StorageError> {
        let bucket_dir = self.bucket_dir();
        let mut pending = vec![dir];

        while let Some(current) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_name().to_string_lossy().starts_with(PARTIAL_PREFIX) {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&bucket_dir) {
                    let key =
                        relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
                    keys.push(key);
                }
            }
        }

        Ok(())
    }

    /// Deepest directory that can hold keys starting with `prefix`.
    fn listing_root(&self, prefix: &str) -> Result<PathBuf, StorageError> {
        match prefix.rfind('/') {
            Some(end) if end > 0 => self.object_path(&prefix[..end]),
            _ => Ok(self.bucket_dir()),
        }
    }
}

/// Replaces `path` through a temporary sibling, so a concurrent reader sees the old object or the
/// new one and never a partial write.
fn write_replacing(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = Builder::new().prefix(PARTIAL_PREFIX).tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| StorageError::IoError(e.error))?;
    Ok(())
}

#[async_trait]
impl StorageClient for LocalFsStorage {
    async fn get_data(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::ObjectNotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_data(&self, data: Bytes, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        tokio::task::spawn_blocking(move || write_replacing(&path, &data))
            .await
            .map_err(|e| StorageError::ObjectStreamError(e.to_string()))?
    }

    async fn delete_data(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files_in_dir(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let root = self.listing_root(dir_path)?;
        // a missing directory, or one that is an object itself, holds no keys
        if !tokio::fs::metadata(&root).await.map(|meta| meta.is_dir()).unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.collect_keys(root, &mut keys).await?;
        keys.retain(|key| key.starts_with(dir_path));
        keys.sort();
        Ok(keys)
    }

    fn with_bucket(&self, bucket: &str) -> Arc<dyn StorageClient> {
        Arc::new(Self { root: self.root.clone(), bucket: bucket.to_string() })
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
