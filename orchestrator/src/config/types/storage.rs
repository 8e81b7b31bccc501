use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageProvider {
    AwsS3,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub provider: StorageProvider,

    /// Bucket name or ARN
    pub bucket_identifier: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// S3 compatible endpoint, e.g. a MinIO instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Root directory of the `local` provider
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
}

fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_local_root() -> PathBuf {
    PathBuf::from("./artifacts")
}
