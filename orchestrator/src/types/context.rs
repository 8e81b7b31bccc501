use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether the map phase actually runs or only reuses what a previous run left in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StageSkipPolicy {
    #[default]
    RunAllStages,
    ReuseOutputOnly,
}

impl StageSkipPolicy {
    pub fn from_skip_map(skip_map: bool) -> Self {
        if skip_map {
            Self::ReuseOutputOnly
        } else {
            Self::RunAllStages
        }
    }
}

/// Immutable settings for one pipeline run.
///
/// `execution_id` namespaces every storage key and checkpoint record the run touches, so two
/// contexts with different ids never see each other's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub bucket: String,
    pub stage_timeout: Duration,
    pub skip_policy: StageSkipPolicy,
    pub file_format: String,
    pub fq_seqname: String,
    /// Number of correction partitions. Independent of how many stage 1 calls there are.
    pub num_chunks: usize,
}

impl ExecutionContext {
    /// Partition names handed to the correction stage: `{fq_seqname}_fq1` .. `{fq_seqname}_fq{num_chunks}`.
    pub fn correction_set_names(&self) -> Vec<String> {
        (1..=self.num_chunks).map(|i| format!("{}_fq{}", self.fq_seqname, i)).collect()
    }
}
