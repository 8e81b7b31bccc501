use std::fmt;

use orchestrator_task_backend_interface::TaskFunction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAP_ALIGNMENT1_FUNCTION: &str = "map_alignment1";
pub const INDEX_CORRECTION_FUNCTION: &str = "index_correction";
pub const MAP_ALIGNMENT2_FUNCTION: &str = "map_alignment2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Map1,
    Correction,
    Map2,
}

impl Stage {
    /// Execution order of the map phase.
    pub const ORDERED: [Stage; 3] = [Stage::Map1, Stage::Correction, Stage::Map2];

    pub fn function(&self) -> TaskFunction {
        TaskFunction::new(match self {
            Stage::Map1 => MAP_ALIGNMENT1_FUNCTION,
            Stage::Correction => INDEX_CORRECTION_FUNCTION,
            Stage::Map2 => MAP_ALIGNMENT2_FUNCTION,
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Map1 => "map1",
            Stage::Correction => "correction",
            Stage::Map2 => "map2",
        };
        f.write_str(name)
    }
}

/// Input of one stage 1 call, as produced by preprocessing. Chunk descriptors are passed through
/// untouched; any extra keys are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Input {
    pub fasta_chunk: Value,
    pub fastq_chunk: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of one stage 1 call.
///
/// Tasks may return it either as the positional 6-tuple
/// `(fasta_chunk, fastq_chunk, corrected_map_index_file_candidate, filtered_map_file, base_name, old_id)`
/// or as an object with those field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStage1Output")]
pub struct Stage1Output {
    pub fasta_chunk: Value,
    pub fastq_chunk: Value,
    pub corrected_map_index_file_candidate: String,
    pub filtered_map_file: String,
    pub base_name: String,
    pub old_id: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStage1Output {
    Tuple(Value, Value, String, String, String, Value),
    Named {
        fasta_chunk: Value,
        fastq_chunk: Value,
        corrected_map_index_file_candidate: String,
        filtered_map_file: String,
        base_name: String,
        old_id: Value,
    },
}

impl From<RawStage1Output> for Stage1Output {
    fn from(raw: RawStage1Output) -> Self {
        match raw {
            RawStage1Output::Tuple(
                fasta_chunk,
                fastq_chunk,
                corrected_map_index_file_candidate,
                filtered_map_file,
                base_name,
                old_id,
            )
            | RawStage1Output::Named {
                fasta_chunk,
                fastq_chunk,
                corrected_map_index_file_candidate,
                filtered_map_file,
                base_name,
                old_id,
            } => Self {
                fasta_chunk,
                fastq_chunk,
                corrected_map_index_file_candidate,
                filtered_map_file,
                base_name,
                old_id,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionInput {
    pub setname: String,
    pub bucket: String,
    pub exec_param: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Input {
    pub fasta_chunk: Value,
    pub fastq_chunk: Value,
    pub corrected_map_index_file: String,
    pub filtered_map_file: String,
    pub base_name: String,
    pub old_id: Value,
    pub exec_param: String,
}
