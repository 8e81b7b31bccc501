use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Execution id; namespaces every key and checkpoint of the run
    pub name: String,

    /// Bucket the tasks read from and write to. Defaults to the storage bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub skip_map: bool,

    #[serde(default = "default_file_format")]
    pub file_format: String,

    pub fq_seqname: String,

    pub num_chunks: usize,
}

fn default_timeout() -> u64 {
    1800
}
fn default_file_format() -> String {
    "csv".to_string()
}
