use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orchestrator_task_backend_interface::StageHandleSet;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::checkpoint::{CheckpointError, CheckpointKey, CheckpointStore};
use crate::types::constant::ORCHESTRATOR_VERSION;

/// On-disk shape of a checkpoint record.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    execution_id: String,
    name: String,
    written_at: DateTime<Utc>,
    orchestrator_version: String,
    handles: StageHandleSet,
}

/// Keeps checkpoint records as JSON files at `{root}/{execution_id}/{name}`.
///
/// Records are local to the host. Resuming an execution on another host starts it from scratch.
#[derive(Debug, Clone)]
pub struct LocalCheckpointStore {
    root: PathBuf,
}

impl LocalCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, key: &CheckpointKey) -> Result<PathBuf, CheckpointError> {
        for part in [&key.execution_id, &key.name] {
            if part.is_empty() || part.contains(['/', '\\']) || part == "." || part == ".." {
                return Err(CheckpointError::InvalidKey(key.to_string()));
            }
        }
        Ok(self.root.join(&key.execution_id).join(&key.name))
    }
}

/// Writes to a sibling temporary file, syncs it and renames it over `path`, so a crash leaves
/// either the old record or the new one.
fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), CheckpointError> {
    let dir = path.parent().ok_or_else(|| CheckpointError::InvalidKey(path.display().to_string()))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CheckpointError::IoError(e.error))?;

    if let Ok(dir) = std::fs::File::open(dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[async_trait]
impl CheckpointStore for LocalCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> Result<Option<StageHandleSet>, CheckpointError> {
        let path = self.record_path(key)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CheckpointRecord = serde_json::from_slice(&content)
            .map_err(|e| CheckpointError::Corrupt { key: key.to_string(), reason: e.to_string() })?;
        if record.execution_id != key.execution_id {
            return Err(CheckpointError::ExecutionMismatch { key: key.to_string(), found: record.execution_id });
        }

        debug!(key = %key, written_at = %record.written_at, tasks = record.handles.len(), "Loaded checkpoint");
        Ok(Some(record.handles))
    }

    async fn dump(&self, key: &CheckpointKey, handles: &StageHandleSet) -> Result<(), CheckpointError> {
        let path = self.record_path(key)?;
        let record = CheckpointRecord {
            execution_id: key.execution_id.clone(),
            name: key.name.clone(),
            written_at: Utc::now(),
            orchestrator_version: ORCHESTRATOR_VERSION.to_string(),
            handles: handles.clone(),
        };
        let payload = serde_json::to_vec_pretty(&record)?;

        tokio::task::spawn_blocking(move || write_atomic(&path, &payload)).await??;
        debug!(key = %key, tasks = handles.len(), "Dumped checkpoint");
        Ok(())
    }

    async fn delete(&self, key: &CheckpointKey) -> Result<(), CheckpointError> {
        let path = self.record_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
