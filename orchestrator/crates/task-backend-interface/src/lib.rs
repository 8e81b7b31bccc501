use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task backend provides an abstraction over services that run batches of independent remote
/// functions:
/// - Accept a list of inputs for one named function and start one call per input
/// - Hand back a [StageHandleSet] immediately, before any call has finished
/// - Resolve the whole set later, yielding one output per call or failing if any call failed
///   or did not finish within the timeout given at submission
///
/// A handle set is serializable so that it can outlive the process that submitted it. Awaiting a
/// deserialized set must reattach to the same calls instead of starting new ones.
#[automock]
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn submit(
        &self,
        function: TaskFunction,
        iterdata: Vec<Value>,
        timeout: Duration,
    ) -> Result<StageHandleSet, TaskBackendError>;

    /// Blocks until every call in `handles` has resolved. Outputs are returned in submission order.
    async fn await_results(&self, handles: &StageHandleSet) -> Result<Vec<Value>, TaskBackendError>;
}

/// Name of a function registered on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskFunction(String);

impl TaskFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a single submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub call_id: String,
}

/// The set of calls created by one `submit`. Callers treat it as opaque: the only useful thing to
/// do with it is to persist it or await it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHandleSet {
    executor_id: String,
    job_id: String,
    function: TaskFunction,
    runtime: String,
    timeout_secs: u64,
    handles: Vec<TaskHandle>,
}

impl StageHandleSet {
    pub fn new(
        executor_id: impl Into<String>,
        job_id: impl Into<String>,
        function: TaskFunction,
        runtime: impl Into<String>,
        timeout: Duration,
        handles: Vec<TaskHandle>,
    ) -> Self {
        Self {
            executor_id: executor_id.into(),
            job_id: job_id.into(),
            function,
            runtime: runtime.into(),
            timeout_secs: timeout.as_secs(),
            handles,
        }
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn function(&self) -> &TaskFunction {
        &self.function
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn handles(&self) -> &[TaskHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskBackendError {
    #[error("Function {0} is not registered on this backend")]
    UnknownFunction(TaskFunction),
    #[error("Backend rejected the batch: {0}")]
    SubmissionRejected(String),
    #[error("Call {call_id} failed: {message}")]
    TaskFailed { call_id: String, message: String },
    #[error("{pending} of {total} calls did not finish within {timeout_secs}s")]
    Timeout { pending: usize, total: usize, timeout_secs: u64 },
    #[error("Internal backend error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
