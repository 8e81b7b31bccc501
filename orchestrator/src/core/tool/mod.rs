use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Write the program's stdout to this file instead of returning it.
    pub stdout_path: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), stdout_path: None }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    /// Empty when stdout was redirected to a file
    pub stdout: String,
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} exited with code {code:?}: {stderr}")]
    NonZeroExit { program: String, code: Option<i32>, stderr: String },
    #[error("Failed to launch {program}: {source}")]
    Spawn { program: String, source: std::io::Error },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Capability to run an external program. Any non-zero exit is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalTool: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Runs programs as child processes of the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ProcessTool;

#[async_trait]
impl ExternalTool for ProcessTool {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        debug!(program = %invocation.program, args = ?invocation.args, "Running external tool");

        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolError::Spawn { program: invocation.program.clone(), source })?;

        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                program: invocation.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = match &invocation.stdout_path {
            Some(path) => {
                tokio::fs::write(path, &output.stdout).await?;
                String::new()
            }
            None => String::from_utf8_lossy(&output.stdout).into_owned(),
        };

        Ok(ToolOutput { exit_code: output.status.code().unwrap_or_default(), stdout })
    }
}
