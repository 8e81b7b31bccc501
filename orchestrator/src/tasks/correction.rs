use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::ToolsConfig;
use crate::core::tool::ToolInvocation;
use crate::tasks::{StageTask, TaskEnv, TaskError};
use crate::types::keys::{belongs_to_set, corrected_index_key, file_name, map_index_set_prefix};
use crate::types::CorrectionInput;

/// Programs used to merge and filter index shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionTools {
    pub reducer: String,
    pub merge_script: String,
    pub reducer_fan_in: u32,
    pub filter_script: String,
}

impl From<&ToolsConfig> for CorrectionTools {
    fn from(tools: &ToolsConfig) -> Self {
        Self {
            reducer: tools.reducer.clone(),
            merge_script: tools.merge_script.clone(),
            reducer_fan_in: tools.reducer_fan_in,
            filter_script: tools.filter_script.clone(),
        }
    }
}

/// Merges every index shard of one partition into its corrected index.
///
/// Shards are read from `map_index_files/{exec}/{set}*` and the result is written to
/// `corrected_index/{exec}/{set}.txt`.
pub struct IndexCorrectionTask {
    tools: CorrectionTools,
}

impl IndexCorrectionTask {
    pub fn new(tools: CorrectionTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl StageTask for IndexCorrectionTask {
    async fn run(&self, input: Value, env: &TaskEnv) -> Result<Value, TaskError> {
        let input: CorrectionInput = serde_json::from_value(input).map_err(TaskError::InvalidInput)?;
        let storage = env.storage.with_bucket(&input.bucket);
        let set = input.setname.as_str();

        let prefix = map_index_set_prefix(&input.exec_param, set);
        let shards: Vec<String> = storage
            .list_files_in_dir(&prefix)
            .await?
            .into_iter()
            .filter(|key| belongs_to_set(file_name(key), set))
            .collect();
        if shards.is_empty() {
            return Err(TaskError::NoShards { prefix });
        }

        tokio::fs::create_dir_all(&env.work_dir).await?;
        let mut local_shards: Vec<PathBuf> = Vec::with_capacity(shards.len());
        for key in &shards {
            let local = env.work_dir.join(file_name(key));
            tokio::fs::write(&local, storage.get_data(key).await?).await?;
            local_shards.push(local);
        }
        local_shards.sort();
        debug!(set = %set, shards = local_shards.len(), "Downloaded index shards");

        let intermediate = env.work_dir.join(format!("{}.intermediate.txt", set));
        let merge = ToolInvocation::new(&self.tools.reducer)
            .arg(&self.tools.merge_script)
            .arg(self.tools.reducer_fan_in.to_string())
            .args(local_shards.iter().map(|p| p.display().to_string()))
            .stdout_to(&intermediate);
        env.tool.run(&merge).await?;

        // the filter script appends `.txt` to its output base name
        let output_base = env.work_dir.join(set);
        let filter = ToolInvocation::new(&self.tools.filter_script)
            .arg(intermediate.display().to_string())
            .arg(output_base.display().to_string());
        env.tool.run(&filter).await?;

        let corrected = tokio::fs::read(env.work_dir.join(format!("{}.txt", set))).await?;
        let key = corrected_index_key(&input.exec_param, set);
        storage.put_data(Bytes::from(corrected), &key).await?;

        info!(set = %set, key = %key, "Uploaded corrected index");
        Ok(json!({ "setname": set, "corrected_index": key }))
    }
}
