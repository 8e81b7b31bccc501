/// Raw per-partition index shards produced by stage 1
pub const MAP_INDEX_DIR: &str = "map_index_files";
/// Corrected indices produced by the correction stage
pub const CORRECTED_INDEX_DIR: &str = "corrected_index";
/// Intermediate filtered map files produced by stage 1
pub const FILTERED_MAP_DIR: &str = "filtered_map_files";
/// Final output prefix queried when the map phase is skipped
pub const FINAL_OUTPUT_PREFIX: &str = "csv/";

pub const CORRECTED_INDEX_EXTENSION: &str = ".txt";
/// Separates the set name from the shard suffix in index file names
pub const INDEX_NAME_DELIMITER: char = '-';

pub const MAP1_CHECKPOINT_NAME: &str = "map1_checkpoint";
pub const CORRECTION_CHECKPOINT_NAME: &str = "correction_checkpoint";
pub const MAP2_CHECKPOINT_NAME: &str = "map2_checkpoint";

/// Version of the Orchestrator
pub const ORCHESTRATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
