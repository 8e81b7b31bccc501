pub mod env_interpolation;
pub mod types;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use types::*;

use crate::types::{ExecutionContext, StageSkipPolicy};

/// Versioned configuration wrapper
/// This allows us to evolve the config format over time while maintaining backward compatibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "config_version")]
pub enum PipelineConfigVersioned {
    #[serde(rename = "1")]
    V1(PipelineConfigV1),
}

impl PipelineConfigVersioned {
    /// Load configuration from a YAML file, interpolating `${VAR}` references first
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let content = env_interpolation::interpolate_yaml_content(&content)
            .with_context(|| format!("Failed to interpolate config file: {}", path.display()))?;

        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml_value: serde_yaml::Value = serde_yaml::from_str(content).context("Failed to parse YAML")?;

        if yaml_value.get("config_version").is_none() {
            anyhow::bail!(
                "Missing required field 'config_version' in config file. \
                 Current supported version: 1"
            );
        }

        let versioned: PipelineConfigVersioned = serde_yaml::from_str(content).context("Failed to deserialize config")?;

        Ok(versioned)
    }

    /// Convert to the canonical (latest) config format
    pub fn into_canonical(self) -> PipelineConfig {
        match self {
            PipelineConfigVersioned::V1(v1) => v1,
        }
    }
}

/// Canonical configuration (always latest version internally)
pub type PipelineConfig = PipelineConfigV1;

/// Version 1 of the pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfigV1 {
    pub execution: ExecutionConfig,
    pub storage: StorageSettings,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Values given on the command line that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOverrides {
    pub execution_name: Option<String>,
    pub skip_map: bool,
}

impl PipelineConfigV1 {
    /// Builds the context of one run. `storage_bucket` is the bucket of the resolved storage client,
    /// used when the execution section does not name one.
    pub fn execution_context(&self, overrides: &ExecutionOverrides, storage_bucket: &str) -> Result<ExecutionContext> {
        let execution = &self.execution;
        let execution_id = overrides.execution_name.clone().unwrap_or_else(|| execution.name.clone());

        if execution_id.is_empty() || execution_id.contains('/') {
            anyhow::bail!("Execution name must be non-empty and must not contain '/': {:?}", execution_id);
        }
        if execution.num_chunks == 0 {
            anyhow::bail!("execution.num_chunks must be at least 1");
        }
        if execution.timeout_seconds == 0 {
            anyhow::bail!("execution.timeout_seconds must be at least 1");
        }

        Ok(ExecutionContext {
            execution_id,
            bucket: execution.bucket.clone().unwrap_or_else(|| storage_bucket.to_string()),
            stage_timeout: Duration::from_secs(execution.timeout_seconds),
            skip_policy: StageSkipPolicy::from_skip_map(overrides.skip_map || execution.skip_map),
            file_format: execution.file_format.clone(),
            fq_seqname: execution.fq_seqname.clone(),
            num_chunks: execution.num_chunks,
        })
    }
}
