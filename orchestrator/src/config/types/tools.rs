use serde::{Deserialize, Serialize};

/// External programs run by the map phase tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_map1_program")]
    pub map1_program: String,

    #[serde(default = "default_map2_program")]
    pub map2_program: String,

    #[serde(default = "default_reducer")]
    pub reducer: String,

    #[serde(default = "default_merge_script")]
    pub merge_script: String,

    /// Number of files the reducer merges per step
    #[serde(default = "default_reducer_fan_in")]
    pub reducer_fan_in: u32,

    #[serde(default = "default_filter_script")]
    pub filter_script: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            map1_program: default_map1_program(),
            map2_program: default_map2_program(),
            reducer: default_reducer(),
            merge_script: default_merge_script(),
            reducer_fan_in: default_reducer_fan_in(),
            filter_script: default_filter_script(),
        }
    }
}

fn default_map1_program() -> String {
    "/function/bin/map_alignment1.sh".to_string()
}
fn default_map2_program() -> String {
    "/function/bin/map_alignment2.sh".to_string()
}
fn default_reducer() -> String {
    "/function/bin/binary_reducer.sh".to_string()
}
fn default_merge_script() -> String {
    "/function/bin/merge_gem_alignment_metrics.sh".to_string()
}
fn default_reducer_fan_in() -> u32 {
    4
}
fn default_filter_script() -> String {
    "/function/bin/filter_merged_index.sh".to_string()
}
