use orchestrator_task_backend_interface::TaskBackendError;
use thiserror::Error;

use crate::core::checkpoint::CheckpointError;
use crate::core::client::storage::StorageError;
use crate::types::Stage;

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Error types for the orchestrator
///
/// Stage-tagged variants carry the stage the failure happened in so the binary can report where
/// a run stopped.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Stage {stage}: submission failed: {source}")]
    Submission {
        stage: Stage,
        #[source]
        source: TaskBackendError,
    },

    #[error("Stage {stage}: task execution failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: TaskBackendError,
    },

    #[error("Stage {stage}: invalid task output: {reason}")]
    InvalidStageOutput { stage: Stage, reason: String },

    #[error("Failed to encode stage input: {0}")]
    EncodeError(#[from] serde_json::Error),

    #[error("Checkpoint error: {0}")]
    CheckpointError(#[from] CheckpointError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Orchestrator Error: {0}")]
    OrchestratorAnyHowError(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Submission { stage, .. } | Self::StageFailed { stage, .. } | Self::InvalidStageOutput { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}
