use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint record {key} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Checkpoint record {key} belongs to execution {found}")]
    ExecutionMismatch { key: String, found: String },
    #[error("Invalid checkpoint key: {0}")]
    InvalidKey(String),
    #[error("Failed to encode checkpoint record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Checkpoint writer task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}
