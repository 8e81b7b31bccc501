use std::sync::Arc;

use tracing::{info, warn};

use crate::core::checkpoint::{CheckpointKeys, CheckpointStore};
use crate::core::client::storage::StorageClient;
use crate::types::keys::intermediate_prefixes;
use crate::types::ExecutionContext;

/// Outcome of a cleanup pass. Failures are counted, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_objects: usize,
    pub deleted_checkpoints: usize,
    pub failures: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Deletes every object under `prefix`. Returns how many were deleted and how many deletes failed.
pub(crate) async fn delete_prefix(storage: &dyn StorageClient, prefix: &str) -> (usize, usize) {
    let keys = match storage.list_files_in_dir(prefix).await {
        Ok(keys) => keys,
        Err(e) => {
            warn!(prefix = %prefix, error = %e, "Failed to list objects for deletion");
            return (0, 1);
        }
    };

    let (mut deleted, mut failed) = (0, 0);
    for key in keys {
        match storage.delete_data(&key).await {
            Ok(()) => deleted += 1,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete object");
                failed += 1;
            }
        }
    }
    (deleted, failed)
}

/// Removes the intermediate artifacts and checkpoint records of one execution.
///
/// Only the three intermediate prefixes and the three stage records of `ctx.execution_id` are
/// touched. Final output is kept.
pub async fn cleanup(
    ctx: &ExecutionContext,
    storage: &Arc<dyn StorageClient>,
    checkpoints: &dyn CheckpointStore,
    keys: &CheckpointKeys,
) -> CleanupReport {
    let storage = storage.with_bucket(&ctx.bucket);
    let mut report = CleanupReport::default();

    for prefix in intermediate_prefixes(&ctx.execution_id) {
        let (deleted, failed) = delete_prefix(storage.as_ref(), &prefix).await;
        report.deleted_objects += deleted;
        report.failures += failed;
    }

    for key in keys.all_for(&ctx.execution_id) {
        match checkpoints.delete(&key).await {
            Ok(()) => report.deleted_checkpoints += 1,
            Err(e) => {
                warn!(checkpoint = %key, error = %e, "Failed to delete checkpoint");
                report.failures += 1;
            }
        }
    }

    info!(
        execution_id = %ctx.execution_id,
        deleted_objects = report.deleted_objects,
        deleted_checkpoints = report.deleted_checkpoints,
        failures = report.failures,
        "Cleanup finished"
    );
    report
}
