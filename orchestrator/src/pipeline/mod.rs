pub mod cleanup;
pub mod derivation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_task_backend_interface::TaskBackend;
use serde_json::Value;
use tracing::{info, warn};

pub use cleanup::CleanupReport;
pub use derivation::{derive_stage2_inputs, first_segment};

use crate::core::checkpoint::{CheckpointKeys, CheckpointStore};
use crate::core::client::storage::StorageClient;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::types::constant::FINAL_OUTPUT_PREFIX;
use crate::types::keys::mapper_output_prefix;
use crate::types::{CorrectionInput, ExecutionContext, Stage, Stage1Input, Stage1Output, StageSkipPolicy};

/// Drives the map phase: stage 1, index correction and stage 2, in that order.
///
/// Each stage is checkpoint first: a stored handle set means the stage was already submitted and
/// is only awaited again. A new handle set is stored right after submission and before awaiting, so
/// a crash while tasks run leaves a record to reattach to.
pub struct MapOrchestrator {
    backend: Arc<dyn TaskBackend>,
    storage: Arc<dyn StorageClient>,
    checkpoints: Arc<dyn CheckpointStore>,
    keys: CheckpointKeys,
}

impl MapOrchestrator {
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        storage: Arc<dyn StorageClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        keys: CheckpointKeys,
    ) -> Self {
        Self { backend, storage, checkpoints, keys }
    }

    /// Runs the whole map phase and returns its wall clock time, cleanup excluded.
    ///
    /// Any stage failure aborts the run before later stages are submitted; no cleanup happens in
    /// that case and the failed stage's checkpoint stays in place.
    #[tracing::instrument(skip(self, ctx, iterdata), fields(execution_id = %ctx.execution_id, tasks = iterdata.len()))]
    pub async fn run_pipeline(&self, ctx: &ExecutionContext, iterdata: Vec<Stage1Input>) -> OrchestratorResult<Duration> {
        let storage = self.storage.with_bucket(&ctx.bucket);

        if ctx.skip_policy == StageSkipPolicy::ReuseOutputOnly {
            let start = Instant::now();
            let outputs = storage.list_files_in_dir(FINAL_OUTPUT_PREFIX).await?;
            info!(outputs = outputs.len(), prefix = FINAL_OUTPUT_PREFIX, "Skipping map phase, reusing existing output");
            return Ok(start.elapsed());
        }

        // once stage 2 is submitted the prefix holds its output, not stale files
        let stale = mapper_output_prefix(&ctx.file_format, &ctx.execution_id);
        let map2_key = self.keys.key_for(Stage::Map2, &ctx.execution_id);
        if self.checkpoints.load(&map2_key).await?.is_some() {
            info!(prefix = %stale, checkpoint = %map2_key, "Stage 2 already submitted, keeping mapper outputs");
        } else {
            let (deleted, failed) = cleanup::delete_prefix(storage.as_ref(), &stale).await;
            if failed > 0 {
                warn!(prefix = %stale, deleted, failed, "Some previous mapper outputs could not be deleted");
            } else {
                info!(prefix = %stale, deleted, "Deleted previous mapper outputs");
            }
        }

        info!(tasks = iterdata.len(), "Running map phase");
        let start = Instant::now();

        let map1_results = self.run_stage(ctx, Stage::Map1, || encode_all(&iterdata)).await?;
        let stage1_outputs = map1_results
            .into_iter()
            .map(serde_json::from_value::<Stage1Output>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OrchestratorError::InvalidStageOutput { stage: Stage::Map1, reason: e.to_string() })?;

        // only gates stage 2; the corrected indices are read back from storage by key
        self.run_stage(ctx, Stage::Correction, || encode_all(&correction_iterdata(ctx))).await?;

        self.run_stage(ctx, Stage::Map2, || encode_all(&derive_stage2_inputs(&stage1_outputs, &ctx.execution_id)))
            .await?;

        let elapsed = start.elapsed();
        info!(elapsed_secs = elapsed.as_secs_f64(), "Map phase finished");

        self.cleanup(ctx).await;
        Ok(elapsed)
    }

    /// Best effort removal of the intermediate artifacts and checkpoints of `ctx`.
    pub async fn cleanup(&self, ctx: &ExecutionContext) -> CleanupReport {
        cleanup::cleanup(ctx, &self.storage, self.checkpoints.as_ref(), &self.keys).await
    }

    /// Resolves one stage. `build_iterdata` only runs when the stage has no checkpoint.
    #[tracing::instrument(skip(self, ctx, build_iterdata), fields(execution_id = %ctx.execution_id, stage = %stage))]
    async fn run_stage<F>(&self, ctx: &ExecutionContext, stage: Stage, build_iterdata: F) -> OrchestratorResult<Vec<Value>>
    where
        F: FnOnce() -> OrchestratorResult<Vec<Value>> + Send,
    {
        let key = self.keys.key_for(stage, &ctx.execution_id);

        let handles = match self.checkpoints.load(&key).await? {
            Some(handles) => {
                info!(checkpoint = %key, tasks = handles.len(), "Found checkpoint, reattaching to submitted tasks");
                if handles.function() != &stage.function() {
                    warn!(checkpoint = %key, function = %handles.function(), "Checkpoint was written for another function");
                }
                handles
            }
            None => {
                let iterdata = build_iterdata()?;
                info!(tasks = iterdata.len(), "Submitting stage");
                let handles = self
                    .backend
                    .submit(stage.function(), iterdata, ctx.stage_timeout)
                    .await
                    .map_err(|source| OrchestratorError::Submission { stage, source })?;
                self.checkpoints.dump(&key, &handles).await?;
                handles
            }
        };

        let results = self
            .backend
            .await_results(&handles)
            .await
            .map_err(|source| OrchestratorError::StageFailed { stage, source })?;

        info!(results = results.len(), "Stage completed");
        Ok(results)
    }
}

/// One correction input per partition.
pub fn correction_iterdata(ctx: &ExecutionContext) -> Vec<CorrectionInput> {
    ctx.correction_set_names()
        .into_iter()
        .map(|setname| CorrectionInput { setname, bucket: ctx.bucket.clone(), exec_param: ctx.execution_id.clone() })
        .collect()
}

fn encode_all<T: serde::Serialize>(items: &[T]) -> OrchestratorResult<Vec<Value>> {
    items.iter().map(|item| serde_json::to_value(item).map_err(OrchestratorError::from)).collect()
}
