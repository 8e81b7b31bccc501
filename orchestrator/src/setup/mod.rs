use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use aws_config::Region;
use tracing::info;

use crate::config::{ExecutionOverrides, PipelineConfig, StorageProvider, StorageSettings};
use crate::core::checkpoint::LocalCheckpointStore;
use crate::core::client::executor::{ExecutorSettings, LocalExecutor};
use crate::core::client::storage::local::LocalFsStorage;
use crate::core::client::storage::s3::AWSS3;
use crate::core::client::storage::StorageClient;
use crate::core::tool::ProcessTool;
use crate::pipeline::MapOrchestrator;
use crate::tasks::TaskRegistry;
use crate::types::{ExecutionContext, Stage1Input};
use crate::{OrchestratorError, OrchestratorResult};

/// Storage client for the configured provider
pub async fn setup_storage(settings: &StorageSettings) -> Arc<dyn StorageClient> {
    match settings.provider {
        StorageProvider::Local => {
            info!(root = %settings.local_root.display(), bucket = %settings.bucket_identifier, "Using local storage");
            Arc::new(LocalFsStorage::new(&settings.local_root, &settings.bucket_identifier))
        }
        StorageProvider::AwsS3 => {
            let aws_config = aws_config::from_env().region(Region::new(settings.region.clone())).load().await;
            info!(bucket = %settings.bucket_identifier, region = %settings.region, "Using S3 storage");
            Arc::new(AWSS3::new(&aws_config, settings))
        }
    }
}

/// Wires storage, checkpoint store and task backend into an orchestrator for one execution.
pub async fn setup_pipeline(
    config: &PipelineConfig,
    overrides: &ExecutionOverrides,
) -> OrchestratorResult<(MapOrchestrator, ExecutionContext)> {
    let storage = setup_storage(&config.storage).await;
    let ctx = config
        .execution_context(overrides, storage.bucket())
        .map_err(|e| OrchestratorError::ConfigError(format!("{:#}", e)))?;

    let registry = TaskRegistry::map_phase(&config.tools);
    let backend = LocalExecutor::new(
        storage.clone(),
        Arc::new(ProcessTool),
        registry,
        ExecutorSettings::from(&config.backend),
    );
    info!(executor_id = %backend.executor_id(), runtime = %ExecutorSettings::from(&config.backend).runtime(), "Task backend ready");

    let checkpoints = Arc::new(LocalCheckpointStore::new(&config.checkpoint.root));
    let orchestrator = MapOrchestrator::new(Arc::new(backend), storage, checkpoints, config.checkpoint.keys());

    Ok((orchestrator, ctx))
}

/// Reads the stage 1 inputs written by preprocessing: a JSON array of objects.
pub fn load_iterdata(path: &Path) -> anyhow::Result<Vec<Stage1Input>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read iterdata file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid iterdata in {}", path.display()))
}
