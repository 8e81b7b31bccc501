use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::checkpoint::CheckpointKeys;
use crate::types::constant::{CORRECTION_CHECKPOINT_NAME, MAP1_CHECKPOINT_NAME, MAP2_CHECKPOINT_NAME};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_map1_name")]
    pub map1_name: String,

    #[serde(default = "default_correction_name")]
    pub correction_name: String,

    #[serde(default = "default_map2_name")]
    pub map2_name: String,
}

impl CheckpointConfig {
    pub fn keys(&self) -> CheckpointKeys {
        CheckpointKeys::new(&self.map1_name, &self.correction_name, &self.map2_name)
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            map1_name: default_map1_name(),
            correction_name: default_correction_name(),
            map2_name: default_map2_name(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./checkpoints")
}
fn default_map1_name() -> String {
    MAP1_CHECKPOINT_NAME.to_string()
}
fn default_correction_name() -> String {
    CORRECTION_CHECKPOINT_NAME.to_string()
}
fn default_map2_name() -> String {
    MAP2_CHECKPOINT_NAME.to_string()
}
