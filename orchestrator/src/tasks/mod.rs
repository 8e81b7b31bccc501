pub mod alignment;
pub mod correction;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_task_backend_interface::TaskFunction;
use serde_json::Value;
use thiserror::Error;

pub use alignment::AlignmentTask;
pub use correction::{CorrectionTools, IndexCorrectionTask};

use crate::config::ToolsConfig;
use crate::core::client::storage::{StorageClient, StorageError};
use crate::core::tool::{ExternalTool, ToolError};
use crate::types::Stage;

/// What a task gets to work with besides its input.
#[derive(Clone)]
pub struct TaskEnv {
    pub storage: Arc<dyn StorageClient>,
    pub tool: Arc<dyn ExternalTool>,
    /// Scratch directory owned by this call only
    pub work_dir: PathBuf,
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid task input: {0}")]
    InvalidInput(#[source] serde_json::Error),
    #[error("Invalid task output: {0}")]
    InvalidOutput(String),
    #[error("No index shards found under {prefix}")]
    NoShards { prefix: String },
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("External tool failed: {0}")]
    ToolError(#[from] ToolError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A function that the task backend can run once per input item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageTask: Send + Sync {
    async fn run(&self, input: Value, env: &TaskEnv) -> Result<Value, TaskError>;
}

/// Maps task function names to their implementation.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskFunction, Arc<dyn StageTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three map phase functions wired to the configured tools.
    pub fn map_phase(tools: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Stage::Map1.function(), Arc::new(AlignmentTask::new(Stage::Map1, &tools.map1_program)));
        registry.register(
            Stage::Correction.function(),
            Arc::new(IndexCorrectionTask::new(CorrectionTools::from(tools))),
        );
        registry.register(Stage::Map2.function(), Arc::new(AlignmentTask::new(Stage::Map2, &tools.map2_program)));
        registry
    }

    pub fn register(&mut self, function: TaskFunction, task: Arc<dyn StageTask>) {
        self.tasks.insert(function, task);
    }

    pub fn get(&self, function: &TaskFunction) -> Option<Arc<dyn StageTask>> {
        self.tasks.get(function).cloned()
    }
}
