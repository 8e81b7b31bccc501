use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use orchestrator_task_backend_interface::{StageHandleSet, TaskBackend, TaskBackendError, TaskFunction, TaskHandle};
use rstest::*;
use serde_json::{json, Value};

use crate::core::checkpoint::{CheckpointKeys, CheckpointStore, LocalCheckpointStore};
use crate::core::client::storage::local::LocalFsStorage;
use crate::core::client::storage::StorageClient;
use crate::pipeline::MapOrchestrator;
use crate::types::{ExecutionContext, Stage, Stage1Input, StageSkipPolicy};

pub const BUCKET: &str = "genomics";
pub const FQ_SEQNAME: &str = "SRR6052133";

/// What the backend saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Submit { function: String, tasks: usize },
    Await { function: String },
}

type Responder = Box<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Task backend that computes every call's output with a per-function closure when awaited.
///
/// Submitted inputs outlive any orchestrator using it, like a remote backend does, so a second
/// orchestrator can reattach to handle sets of a first one.
#[derive(Default)]
pub struct ScriptedBackend {
    responders: HashMap<String, Responder>,
    rejected: HashSet<String>,
    jobs: Mutex<HashMap<String, Vec<Value>>>,
    events: Mutex<Vec<BackendEvent>>,
    counter: AtomicUsize,
}

impl ScriptedBackend {
    pub fn respond(mut self, stage: Stage, responder: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        self.responders.insert(stage.function().to_string(), Box::new(responder));
        self
    }

    pub fn reject_submission(mut self, stage: Stage) -> Self {
        self.rejected.insert(stage.function().to_string());
        self
    }

    pub fn events(&self) -> Vec<BackendEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn submissions(&self, stage: Stage) -> usize {
        let function = stage.function().to_string();
        self.events().iter().filter(|e| matches!(e, BackendEvent::Submit { function: f, .. } if *f == function)).count()
    }

    /// Inputs of every call submitted for `stage`, across all submissions.
    pub fn inputs_of(&self, stage: Stage) -> Vec<Value> {
        let prefix = format!("{}-", stage.function());
        let jobs = self.jobs.lock().unwrap();
        let mut ids: Vec<&String> = jobs.keys().filter(|id| id.starts_with(&prefix)).collect();
        ids.sort();
        ids.into_iter().flat_map(|id| jobs[id].clone()).collect()
    }
}

#[async_trait]
impl TaskBackend for ScriptedBackend {
    async fn submit(
        &self,
        function: TaskFunction,
        iterdata: Vec<Value>,
        timeout: Duration,
    ) -> Result<StageHandleSet, TaskBackendError> {
        if self.rejected.contains(function.as_str()) {
            return Err(TaskBackendError::SubmissionRejected(format!("{} is not deployed", function)));
        }
        let job_id = format!("{}-{:03}", function, self.counter.fetch_add(1, Ordering::SeqCst));
        let handles = (0..iterdata.len()).map(|i| TaskHandle { call_id: format!("{:05}", i) }).collect();

        self.events.lock().unwrap().push(BackendEvent::Submit { function: function.to_string(), tasks: iterdata.len() });
        self.jobs.lock().unwrap().insert(job_id.clone(), iterdata);

        Ok(StageHandleSet::new("scripted", job_id, function, "test-runtime:1024", timeout, handles))
    }

    async fn await_results(&self, handles: &StageHandleSet) -> Result<Vec<Value>, TaskBackendError> {
        self.events.lock().unwrap().push(BackendEvent::Await { function: handles.function().to_string() });

        let inputs = self.jobs.lock().unwrap().get(handles.job_id()).cloned().ok_or_else(|| {
            TaskBackendError::TaskFailed { call_id: "-".into(), message: format!("unknown job {}", handles.job_id()) }
        })?;
        let responder = self.responders.get(handles.function().as_str());

        inputs
            .iter()
            .zip(handles.handles())
            .map(|(input, handle)| match responder {
                Some(respond) => respond(input)
                    .map_err(|message| TaskBackendError::TaskFailed { call_id: handle.call_id.clone(), message }),
                None => Ok(Value::Null),
            })
            .collect()
    }
}

/// Stage 1 output the way the mapper reports it: the index candidate names the fastq chunk's
/// correction set.
pub fn stage1_tuple(input: &Value) -> Result<Value, String> {
    let fasta = input["fasta_chunk"]["id"].as_u64().ok_or("missing fasta id")?;
    let fastq = input["fastq_chunk"]["id"].as_u64().ok_or("missing fastq id")?;
    Ok(json!([
        input["fasta_chunk"],
        input["fastq_chunk"],
        format!("{}_fq{}-{}_map.index.txt", FQ_SEQNAME, fastq + 1, fasta),
        format!("{}_fq{}-{}_filt_wline_no.map", FQ_SEQNAME, fastq + 1, fasta),
        format!("{}_fq{}-{}", FQ_SEQNAME, fastq + 1, fasta),
        fasta * 10 + fastq,
    ]))
}

pub fn stage1_inputs(fasta_chunks: u64, fastq_chunks: u64) -> Vec<Stage1Input> {
    let mut inputs = Vec::new();
    for fasta in 0..fasta_chunks {
        for fastq in 0..fastq_chunks {
            inputs.push(
                serde_json::from_value(json!({
                    "fasta_chunk": {"id": fasta, "key": format!("fasta/chunk_{}", fasta)},
                    "fastq_chunk": {"id": fastq, "key": format!("fastq/chunk_{}", fastq)},
                }))
                .unwrap(),
            );
        }
    }
    inputs
}

pub fn execution_context(execution_id: &str) -> ExecutionContext {
    ExecutionContext {
        execution_id: execution_id.into(),
        bucket: BUCKET.into(),
        stage_timeout: Duration::from_secs(30),
        skip_policy: StageSkipPolicy::RunAllStages,
        file_format: "csv".into(),
        fq_seqname: FQ_SEQNAME.into(),
        num_chunks: 3,
    }
}

/// Storage and checkpoint directories of one test.
pub struct TestWorkspace {
    pub dir: tempfile::TempDir,
    pub storage: Arc<dyn StorageClient>,
    pub checkpoints: Arc<LocalCheckpointStore>,
}

impl TestWorkspace {
    pub fn orchestrator(&self, backend: Arc<dyn TaskBackend>) -> MapOrchestrator {
        let checkpoints: Arc<dyn CheckpointStore> = self.checkpoints.clone();
        MapOrchestrator::new(backend, self.storage.clone(), checkpoints, CheckpointKeys::default())
    }

    pub async fn seed(&self, keys: &[&str]) {
        for key in keys {
            self.storage.put_data(Bytes::from(key.to_string()), key).await.unwrap();
        }
    }

    pub async fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.storage.list_files_in_dir(prefix).await.unwrap()
    }

    pub async fn has_checkpoint(&self, stage: Stage, execution_id: &str) -> bool {
        let key = CheckpointKeys::default().key_for(stage, execution_id);
        self.checkpoints.load(&key).await.unwrap().is_some()
    }
}

#[fixture]
pub fn workspace() -> TestWorkspace {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn StorageClient> = Arc::new(LocalFsStorage::new(dir.path().join("storage"), BUCKET));
    let checkpoints = Arc::new(LocalCheckpointStore::new(dir.path().join("checkpoints")));
    TestWorkspace { dir, storage, checkpoints }
}
