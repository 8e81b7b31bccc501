//! Storage key layout. Every prefix ends with `/` after the execution id so that listing the
//! keys of execution `E1` never returns keys of `E10`.

use crate::types::constant::{CORRECTED_INDEX_DIR, CORRECTED_INDEX_EXTENSION, FILTERED_MAP_DIR, MAP_INDEX_DIR};

pub fn map_index_prefix(execution_id: &str) -> String {
    format!("{}/{}/", MAP_INDEX_DIR, execution_id)
}

/// Prefix of every shard of one correction set. Matches more than the set itself (`x_fq1` is a
/// prefix of `x_fq10`), so listings must be narrowed with [belongs_to_set].
pub fn map_index_set_prefix(execution_id: &str, set_name: &str) -> String {
    format!("{}{}", map_index_prefix(execution_id), set_name)
}

pub fn corrected_index_prefix(execution_id: &str) -> String {
    format!("{}/{}/", CORRECTED_INDEX_DIR, execution_id)
}

pub fn corrected_index_key(execution_id: &str, set_name: &str) -> String {
    format!("{}{}{}", corrected_index_prefix(execution_id), set_name, CORRECTED_INDEX_EXTENSION)
}

pub fn filtered_map_prefix(execution_id: &str) -> String {
    format!("{}/{}/", FILTERED_MAP_DIR, execution_id)
}

/// Where the mapper leaves its final output for a run
pub fn mapper_output_prefix(file_format: &str, execution_id: &str) -> String {
    format!("{}/{}/", file_format, execution_id)
}

/// The three prefixes holding intermediate artifacts of a run, deleted once the run succeeds.
pub fn intermediate_prefixes(execution_id: &str) -> [String; 3] {
    [map_index_prefix(execution_id), corrected_index_prefix(execution_id), filtered_map_prefix(execution_id)]
}

/// Last path segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// True when `file_name` is the set itself or one of its shards (`{set}-...` or `{set}.<ext>`).
pub fn belongs_to_set(file_name: &str, set_name: &str) -> bool {
    match file_name.strip_prefix(set_name) {
        Some(rest) => rest.is_empty() || rest.starts_with('-') || rest.starts_with('.'),
        None => false,
    }
}
