pub mod error;
pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use orchestrator_task_backend_interface::StageHandleSet;

pub use error::CheckpointError;
pub use local::LocalCheckpointStore;

use crate::types::constant::{CORRECTION_CHECKPOINT_NAME, MAP1_CHECKPOINT_NAME, MAP2_CHECKPOINT_NAME};
use crate::types::Stage;

/// Identifies one checkpoint record: a record name scoped to an execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub execution_id: String,
    pub name: String,
}

impl std::fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.execution_id, self.name)
    }
}

/// Record name for each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointKeys {
    names: HashMap<Stage, String>,
}

impl CheckpointKeys {
    pub fn new(map1: impl Into<String>, correction: impl Into<String>, map2: impl Into<String>) -> Self {
        let names = HashMap::from([
            (Stage::Map1, map1.into()),
            (Stage::Correction, correction.into()),
            (Stage::Map2, map2.into()),
        ]);
        Self { names }
    }

    pub fn key_for(&self, stage: Stage, execution_id: &str) -> CheckpointKey {
        // every stage is populated by the constructor
        let name = self.names.get(&stage).cloned().unwrap_or_else(|| stage.to_string());
        CheckpointKey { execution_id: execution_id.to_string(), name }
    }

    /// Keys of every stage of an execution, in stage order.
    pub fn all_for(&self, execution_id: &str) -> Vec<CheckpointKey> {
        Stage::ORDERED.iter().map(|stage| self.key_for(*stage, execution_id)).collect()
    }
}

impl Default for CheckpointKeys {
    fn default() -> Self {
        Self::new(MAP1_CHECKPOINT_NAME, CORRECTION_CHECKPOINT_NAME, MAP2_CHECKPOINT_NAME)
    }
}

/// Persists the handle set of every submitted stage.
///
/// A record exists exactly when its stage has been submitted by this or a previous run; absence
/// is the signal to submit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, key: &CheckpointKey) -> Result<Option<StageHandleSet>, CheckpointError>;

    /// Must either leave the previous state untouched or write the whole record.
    async fn dump(&self, key: &CheckpointKey, handles: &StageHandleSet) -> Result<(), CheckpointError>;

    /// Removing a record that does not exist succeeds.
    async fn delete(&self, key: &CheckpointKey) -> Result<(), CheckpointError>;
}
