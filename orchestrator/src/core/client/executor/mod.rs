use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use orchestrator_task_backend_interface::{StageHandleSet, TaskBackend, TaskBackendError, TaskFunction, TaskHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::core::client::storage::{StorageClient, StorageError};
use crate::core::tool::ExternalTool;
use crate::tasks::{StageTask, TaskEnv, TaskRegistry};

/// Prefix under which call status objects are kept.
pub const EXECUTOR_STATUS_DIR: &str = "executor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub runtime_id: String,
    pub runtime_memory_mb: u32,
    pub poll_interval: Duration,
    /// Parent of every call's scratch directory
    pub work_dir: PathBuf,
}

impl ExecutorSettings {
    pub fn runtime(&self) -> String {
        format!("{}:{}", self.runtime_id, self.runtime_memory_mb)
    }
}

/// Status object of one call, as stored at `executor/{executor}/{job}/{call}/status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CallStatus {
    Running,
    Success { output: Value },
    Error { message: String },
}

fn status_key(executor_id: &str, job_id: &str, call_id: &str) -> String {
    format!("{}/{}/{}/{}/status.json", EXECUTOR_STATUS_DIR, executor_id, job_id, call_id)
}

/// Runs every submitted call as a tokio task of this process.
///
/// Call outcomes are written to the artifact store rather than kept in memory, so any executor
/// sharing the store can await a handle set, including one created by an earlier process.
///
/// Calls live and die with the process that submitted them. When that process exits early its
/// calls stay `running` in the store, and awaiting them again only fails once the stage timeout
/// has passed. Like checkpoints, resuming only helps on the host and store the run started on.
pub struct LocalExecutor {
    storage: Arc<dyn StorageClient>,
    tool: Arc<dyn ExternalTool>,
    registry: Arc<TaskRegistry>,
    settings: ExecutorSettings,
    executor_id: String,
    job_counter: AtomicUsize,
}

impl LocalExecutor {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        tool: Arc<dyn ExternalTool>,
        registry: TaskRegistry,
        settings: ExecutorSettings,
    ) -> Self {
        let executor_id = Uuid::new_v4().simple().to_string();
        Self { storage, tool, registry: Arc::new(registry), settings, executor_id, job_counter: AtomicUsize::new(0) }
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    async fn write_status(storage: &dyn StorageClient, key: &str, status: &CallStatus) -> Result<(), StorageError> {
        let payload = serde_json::to_vec(status).map_err(|e| StorageError::ObjectStreamError(e.to_string()))?;
        storage.put_data(Bytes::from(payload), key).await
    }

    async fn read_status(&self, key: &str) -> Result<CallStatus, TaskBackendError> {
        match self.storage.get_data(key).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| TaskBackendError::Internal(Box::new(e))),
            // not written yet
            Err(StorageError::ObjectNotFound(_)) => Ok(CallStatus::Running),
            Err(e) => Err(TaskBackendError::Internal(Box::new(e))),
        }
    }
}

/// Body of one spawned call. Every outcome, panics and timeouts included, ends up in the status object.
async fn run_call(
    task: Arc<dyn StageTask>,
    input: Value,
    env: TaskEnv,
    storage: Arc<dyn StorageClient>,
    key: String,
    timeout: Duration,
) {
    let outcome = tokio::time::timeout(timeout, AssertUnwindSafe(task.run(input, &env)).catch_unwind()).await;
    let status = match outcome {
        Ok(Ok(Ok(output))) => CallStatus::Success { output },
        Ok(Ok(Err(e))) => CallStatus::Error { message: e.to_string() },
        Ok(Err(_)) => CallStatus::Error { message: "task panicked".to_string() },
        Err(_) => CallStatus::Error { message: format!("task exceeded its {}s timeout", timeout.as_secs()) },
    };

    match &status {
        CallStatus::Error { message } => warn!(key = %key, error = %message, "Call failed"),
        _ => debug!(key = %key, "Call succeeded"),
    }
    if let Err(e) = LocalExecutor::write_status(storage.as_ref(), &key, &status).await {
        error!(key = %key, error = %e, "Failed to record call status");
    }
    if let Err(e) = tokio::fs::remove_dir_all(&env.work_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(work_dir = %env.work_dir.display(), error = %e, "Failed to remove call work dir");
        }
    }
}

#[async_trait]
impl TaskBackend for LocalExecutor {
    async fn submit(
        &self,
        function: TaskFunction,
        iterdata: Vec<Value>,
        timeout: Duration,
    ) -> Result<StageHandleSet, TaskBackendError> {
        let task = self.registry.get(&function).ok_or_else(|| TaskBackendError::UnknownFunction(function.clone()))?;
        let job_id = format!("M{:03}", self.job_counter.fetch_add(1, Ordering::SeqCst));

        // every call is visible as running before any of them starts, so a rejected submission runs nothing
        let mut calls = Vec::with_capacity(iterdata.len());
        for (index, input) in iterdata.into_iter().enumerate() {
            let call_id = format!("{:05}", index);
            let key = status_key(&self.executor_id, &job_id, &call_id);
            Self::write_status(self.storage.as_ref(), &key, &CallStatus::Running)
                .await
                .map_err(|e| TaskBackendError::SubmissionRejected(e.to_string()))?;
            calls.push((call_id, key, input));
        }

        let mut handles = Vec::with_capacity(calls.len());
        for (call_id, key, input) in calls {
            let env = TaskEnv {
                storage: self.storage.clone(),
                tool: self.tool.clone(),
                work_dir: self.settings.work_dir.join(&self.executor_id).join(&job_id).join(&call_id),
            };
            let span = tracing::info_span!("call", function = %function, job_id = %job_id, call_id = %call_id);
            tokio::spawn(run_call(task.clone(), input, env, self.storage.clone(), key, timeout).instrument(span));

            handles.push(TaskHandle { call_id });
        }

        info!(function = %function, job_id = %job_id, tasks = handles.len(), "Submitted calls");
        Ok(StageHandleSet::new(&self.executor_id, job_id, function, self.settings.runtime(), timeout, handles))
    }

    async fn await_results(&self, handles: &StageHandleSet) -> Result<Vec<Value>, TaskBackendError> {
        if handles.runtime() != self.settings.runtime() {
            warn!(
                recorded = %handles.runtime(),
                current = %self.settings.runtime(),
                "Awaiting calls created under a different runtime"
            );
        }

        let total = handles.len();
        // calls enforce the timeout themselves; the extra poll leaves room for their final status write
        let deadline = Instant::now() + handles.timeout() + self.settings.poll_interval;
        let mut outputs: Vec<Option<Value>> = vec![None; total];

        loop {
            for (slot, handle) in outputs.iter_mut().zip(handles.handles()) {
                if slot.is_some() {
                    continue;
                }
                let key = status_key(handles.executor_id(), handles.job_id(), &handle.call_id);
                match self.read_status(&key).await? {
                    CallStatus::Success { output } => *slot = Some(output),
                    CallStatus::Error { message } => {
                        return Err(TaskBackendError::TaskFailed { call_id: handle.call_id.clone(), message });
                    }
                    CallStatus::Running => {}
                }
            }

            let pending = outputs.iter().filter(|slot| slot.is_none()).count();
            if pending == 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(TaskBackendError::Timeout { pending, total, timeout_secs: handles.timeout().as_secs() });
            }
            debug!(job_id = %handles.job_id(), pending, total, "Waiting for calls");
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        Ok(outputs.into_iter().flatten().collect())
    }
}
