use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::client::executor::ExecutorSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_runtime_id")]
    pub runtime_id: String,

    #[serde(default = "default_runtime_memory")]
    pub runtime_memory_mb: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            runtime_id: default_runtime_id(),
            runtime_memory_mb: default_runtime_memory(),
            poll_interval_ms: default_poll_interval(),
            work_dir: default_work_dir(),
        }
    }
}

impl From<&BackendConfig> for ExecutorSettings {
    fn from(config: &BackendConfig) -> Self {
        Self {
            runtime_id: config.runtime_id.clone(),
            runtime_memory_mb: config.runtime_memory_mb,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            work_dir: config.work_dir.clone(),
        }
    }
}

fn default_runtime_id() -> String {
    "map-runtime".to_string()
}
fn default_runtime_memory() -> u32 {
    2048
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("map-orchestrator")
}
