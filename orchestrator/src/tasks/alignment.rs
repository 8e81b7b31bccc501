use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::tool::ToolInvocation;
use crate::tasks::{StageTask, TaskEnv, TaskError};
use crate::types::{Stage, Stage1Output};

const INPUT_FILE_NAME: &str = "input.json";
const OUTPUT_FILE_NAME: &str = "output.json";

/// Runs one alignment call through the configured mapper program.
///
/// The mapper is invoked as `<program> <input.json> <output.json>`. The input file holds the call's
/// item plus the bucket it should read from, and the program must leave its result as JSON in the
/// output file. For stage 1 that result must be a [Stage1Output].
pub struct AlignmentTask {
    stage: Stage,
    program: String,
}

impl AlignmentTask {
    pub fn new(stage: Stage, program: impl Into<String>) -> Self {
        Self { stage, program: program.into() }
    }
}

#[async_trait]
impl StageTask for AlignmentTask {
    async fn run(&self, input: Value, env: &TaskEnv) -> Result<Value, TaskError> {
        let mut item: Map<String, Value> = serde_json::from_value(input).map_err(TaskError::InvalidInput)?;
        item.entry("bucket").or_insert_with(|| Value::String(env.storage.bucket().to_string()));

        tokio::fs::create_dir_all(&env.work_dir).await?;
        let input_path = env.work_dir.join(INPUT_FILE_NAME);
        let output_path = env.work_dir.join(OUTPUT_FILE_NAME);
        let payload = serde_json::to_vec(&item).map_err(TaskError::InvalidInput)?;
        tokio::fs::write(&input_path, payload).await?;

        let invocation = ToolInvocation::new(&self.program)
            .arg(input_path.display().to_string())
            .arg(output_path.display().to_string());
        env.tool.run(&invocation).await?;

        let raw = tokio::fs::read(&output_path).await?;
        let output: Value = serde_json::from_slice(&raw)
            .map_err(|e| TaskError::InvalidOutput(format!("{} wrote invalid JSON: {}", self.program, e)))?;

        if self.stage == Stage::Map1 {
            serde_json::from_value::<Stage1Output>(output.clone())
                .map_err(|e| TaskError::InvalidOutput(format!("stage 1 result is not a 6-tuple: {}", e)))?;
        }

        debug!(stage = %self.stage, "Alignment call finished");
        Ok(output)
    }
}
