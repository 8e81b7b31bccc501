use crate::types::constant::{CORRECTED_INDEX_EXTENSION, INDEX_NAME_DELIMITER};
use crate::types::{Stage1Output, Stage2Input};

/// Everything before the first `delimiter`, or the whole string when there is none.
pub fn first_segment(value: &str, delimiter: char) -> &str {
    value.split(delimiter).next().unwrap_or(value)
}

/// Name of the corrected index a stage 1 result points at.
pub fn corrected_map_index_file(candidate: &str) -> String {
    format!("{}{}", first_segment(candidate, INDEX_NAME_DELIMITER), CORRECTED_INDEX_EXTENSION)
}

/// Builds one stage 2 input per stage 1 result, in the same order.
pub fn derive_stage2_inputs(results: &[Stage1Output], execution_id: &str) -> Vec<Stage2Input> {
    results
        .iter()
        .map(|result| Stage2Input {
            fasta_chunk: result.fasta_chunk.clone(),
            fastq_chunk: result.fastq_chunk.clone(),
            corrected_map_index_file: corrected_map_index_file(&result.corrected_map_index_file_candidate),
            filtered_map_file: result.filtered_map_file.clone(),
            base_name: result.base_name.clone(),
            old_id: result.old_id.clone(),
            exec_param: execution_id.to_string(),
        })
        .collect()
}
