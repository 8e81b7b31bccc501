use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use orchestrator_task_backend_interface::TaskBackendError;
use rstest::*;
use serde_json::{json, Value};
use tracing_test::traced_test;

use crate::core::checkpoint::{CheckpointError, CheckpointKeys, MockCheckpointStore};
use crate::core::client::executor::{ExecutorSettings, LocalExecutor};
use crate::core::tool::MockExternalTool;
use crate::error::OrchestratorError;
use crate::pipeline::MapOrchestrator;
use crate::tasks::{MockStageTask, TaskError, TaskRegistry};
use crate::tests::common::{
    execution_context, stage1_inputs, stage1_tuple, workspace, BackendEvent, ScriptedBackend, TestWorkspace, BUCKET,
};
use crate::types::{Stage, StageSkipPolicy};

fn happy_backend() -> ScriptedBackend {
    ScriptedBackend::default()
        .respond(Stage::Map1, stage1_tuple)
        .respond(Stage::Correction, |input| Ok(json!({ "setname": input["setname"] })))
        .respond(Stage::Map2, |input| {
            let exec = input["exec_param"].as_str().unwrap_or("-");
            let base_name = input["base_name"].as_str().unwrap_or("-");
            Ok(json!({ "csv": format!("csv/{}/{}.csv", exec, base_name) }))
        })
}

const E1_INTERMEDIATES: [&str; 4] = [
    "map_index_files/E1/SRR6052133_fq1-0_map.index.txt",
    "map_index_files/E1/SRR6052133_fq2-0_map.index.txt",
    "corrected_index/E1/SRR6052133_fq1.txt",
    "filtered_map_files/E1/SRR6052133_fq1-0_filt_wline_no.map",
];

#[rstest]
#[tokio::test]
async fn two_by_three_chunks_flow_through_all_stages(workspace: TestWorkspace) {
    let backend = Arc::new(happy_backend());
    let ctx = execution_context("E1");

    workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(2, 3)).await.unwrap();

    assert_eq!(backend.inputs_of(Stage::Map1).len(), 6);

    let correction = backend.inputs_of(Stage::Correction);
    assert_eq!(
        correction,
        vec![
            json!({"setname": "SRR6052133_fq1", "bucket": BUCKET, "exec_param": "E1"}),
            json!({"setname": "SRR6052133_fq2", "bucket": BUCKET, "exec_param": "E1"}),
            json!({"setname": "SRR6052133_fq3", "bucket": BUCKET, "exec_param": "E1"}),
        ]
    );

    let stage2 = backend.inputs_of(Stage::Map2);
    assert_eq!(stage2.len(), 6);
    assert!(stage2.iter().all(|item| item["exec_param"] == json!("E1")));
    // fasta 1, fastq 2 is the sixth stage 1 input
    assert_eq!(
        stage2[5],
        json!({
            "fasta_chunk": {"id": 1, "key": "fasta/chunk_1"},
            "fastq_chunk": {"id": 2, "key": "fastq/chunk_2"},
            "corrected_map_index_file": "SRR6052133_fq3.txt",
            "filtered_map_file": "SRR6052133_fq3-1_filt_wline_no.map",
            "base_name": "SRR6052133_fq3-1",
            "old_id": 12,
            "exec_param": "E1",
        })
    );
}

#[rstest]
#[tokio::test]
async fn each_stage_is_a_barrier(workspace: TestWorkspace) {
    let backend = Arc::new(happy_backend());

    workspace.orchestrator(backend.clone()).run_pipeline(&execution_context("E1"), stage1_inputs(1, 2)).await.unwrap();

    let submit = |function: &str, tasks| BackendEvent::Submit { function: function.into(), tasks };
    let wait = |function: &str| BackendEvent::Await { function: function.into() };
    assert_eq!(
        backend.events(),
        vec![
            submit("map_alignment1", 2),
            wait("map_alignment1"),
            submit("index_correction", 3),
            wait("index_correction"),
            submit("map_alignment2", 2),
            wait("map_alignment2"),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn rerun_reattaches_instead_of_resubmitting(workspace: TestWorkspace) {
    let correction_down = Arc::new(AtomicBool::new(true));
    let flag = correction_down.clone();
    let backend = Arc::new(
        happy_backend().respond(Stage::Correction, move |_| {
            if flag.load(Ordering::SeqCst) {
                Err("backend lost contact with worker".into())
            } else {
                Ok(Value::Null)
            }
        }),
    );
    let ctx = execution_context("E1");

    let first = workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(2, 3)).await;
    assert_matches!(first, Err(OrchestratorError::StageFailed { stage: Stage::Correction, .. }));
    assert!(workspace.has_checkpoint(Stage::Map1, "E1").await);
    assert!(workspace.has_checkpoint(Stage::Correction, "E1").await);

    // a fresh orchestrator, as after a restart
    correction_down.store(false, Ordering::SeqCst);
    workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(2, 3)).await.unwrap();

    assert_eq!(backend.submissions(Stage::Map1), 1);
    assert_eq!(backend.submissions(Stage::Correction), 1);
    assert_eq!(backend.submissions(Stage::Map2), 1);
    // stage 2 is still derived from the reattached stage 1 results
    assert_eq!(backend.inputs_of(Stage::Map2).len(), 6);
}

#[rstest]
#[tokio::test]
async fn checkpoint_is_written_before_results_are_awaited(workspace: TestWorkspace) {
    let backend = Arc::new(happy_backend().respond(Stage::Map1, |_| Err("timed out after 30s".into())));

    let result = workspace.orchestrator(backend.clone()).run_pipeline(&execution_context("E1"), stage1_inputs(1, 1)).await;

    assert_matches!(
        result,
        Err(OrchestratorError::StageFailed { stage: Stage::Map1, source: TaskBackendError::TaskFailed { .. } })
    );
    assert!(workspace.has_checkpoint(Stage::Map1, "E1").await);
    assert!(!workspace.has_checkpoint(Stage::Correction, "E1").await);
}

#[rstest]
#[case::map1(Stage::Map1)]
#[case::correction(Stage::Correction)]
#[case::map2(Stage::Map2)]
#[tokio::test]
async fn failed_stage_stops_the_run_without_cleanup(workspace: TestWorkspace, #[case] failing: Stage) {
    workspace.seed(&E1_INTERMEDIATES).await;
    let backend = Arc::new(happy_backend().respond(failing, |_| Err("exit status 1".into())));

    let result = workspace.orchestrator(backend.clone()).run_pipeline(&execution_context("E1"), stage1_inputs(2, 1)).await;

    let err = result.unwrap_err();
    assert_eq!(err.stage(), Some(failing));
    for later in Stage::ORDERED.iter().skip_while(|s| **s != failing).skip(1) {
        assert_eq!(backend.submissions(*later), 0, "{} must not be submitted", later);
    }
    assert_eq!(workspace.keys_under("map_index_files/E1/").await.len(), 2);
    assert!(workspace.has_checkpoint(failing, "E1").await);
}

#[rstest]
#[tokio::test]
async fn rejected_submission_leaves_no_checkpoint(workspace: TestWorkspace) {
    let backend = Arc::new(happy_backend().reject_submission(Stage::Correction));

    let result = workspace.orchestrator(backend.clone()).run_pipeline(&execution_context("E1"), stage1_inputs(1, 1)).await;

    assert_matches!(
        result,
        Err(OrchestratorError::Submission { stage: Stage::Correction, source: TaskBackendError::SubmissionRejected(_) })
    );
    assert!(workspace.has_checkpoint(Stage::Map1, "E1").await);
    assert!(!workspace.has_checkpoint(Stage::Correction, "E1").await);
    assert_eq!(backend.submissions(Stage::Map2), 0);
}

#[rstest]
#[tokio::test]
async fn cleanup_removes_exactly_the_runs_intermediates(workspace: TestWorkspace) {
    // an unfinished E2 run that must keep its checkpoints
    let backend = Arc::new(happy_backend().respond(Stage::Map1, |_| Err("still running".into())));
    let _ = workspace.orchestrator(backend).run_pipeline(&execution_context("E2"), stage1_inputs(1, 1)).await;
    assert!(workspace.has_checkpoint(Stage::Map1, "E2").await);

    workspace.seed(&E1_INTERMEDIATES).await;
    workspace
        .seed(&[
            "map_index_files/E10/SRR6052133_fq1-0_map.index.txt",
            "corrected_index/E2/SRR6052133_fq1.txt",
            "filtered_map_files/E2/SRR6052133_fq1-0_filt_wline_no.map",
            "csv/E2/SRR6052133_fq1-0.csv",
            "fasta/chunk_0",
        ])
        .await;

    let backend = Arc::new(happy_backend());
    workspace.orchestrator(backend).run_pipeline(&execution_context("E1"), stage1_inputs(1, 1)).await.unwrap();

    for prefix in ["map_index_files/E1/", "corrected_index/E1/", "filtered_map_files/E1/"] {
        assert!(workspace.keys_under(prefix).await.is_empty(), "{} should be empty", prefix);
    }
    for stage in Stage::ORDERED {
        assert!(!workspace.has_checkpoint(stage, "E1").await);
    }

    assert_eq!(workspace.keys_under("map_index_files/E10/").await.len(), 1);
    assert_eq!(workspace.keys_under("corrected_index/E2/").await.len(), 1);
    assert_eq!(workspace.keys_under("filtered_map_files/E2/").await.len(), 1);
    assert_eq!(workspace.keys_under("csv/E2/").await.len(), 1);
    assert_eq!(workspace.keys_under("fasta/").await.len(), 1);
    assert!(workspace.has_checkpoint(Stage::Map1, "E2").await);
}

#[rstest]
#[tokio::test]
async fn previous_mapper_output_is_purged_before_stage1(workspace: TestWorkspace) {
    workspace.seed(&["csv/E1/stale.csv", "csv/E2/other_run.csv"]).await;

    workspace.orchestrator(Arc::new(happy_backend())).run_pipeline(&execution_context("E1"), stage1_inputs(1, 1)).await.unwrap();

    assert!(workspace.keys_under("csv/E1/").await.is_empty());
    assert_eq!(workspace.keys_under("csv/E2/").await, vec!["csv/E2/other_run.csv".to_string()]);
}

#[rstest]
#[tokio::test]
async fn resumed_stage2_keeps_its_output(workspace: TestWorkspace) {
    let map2_down = Arc::new(AtomicBool::new(true));
    let flag = map2_down.clone();
    let backend = Arc::new(happy_backend().respond(Stage::Map2, move |input| {
        if flag.load(Ordering::SeqCst) {
            Err("lost contact with worker".into())
        } else {
            Ok(json!({ "csv": format!("csv/E1/{}.csv", input["base_name"].as_str().unwrap_or("-")) }))
        }
    }));
    let ctx = execution_context("E1");

    let first = workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(1, 1)).await;
    assert_matches!(first, Err(OrchestratorError::StageFailed { stage: Stage::Map2, .. }));
    // written by the stage 2 call before its result was lost
    workspace.seed(&["csv/E1/SRR6052133_fq1-0.csv"]).await;

    map2_down.store(false, Ordering::SeqCst);
    workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(1, 1)).await.unwrap();

    assert_eq!(backend.submissions(Stage::Map2), 1);
    assert_eq!(workspace.keys_under("csv/E1/").await, vec!["csv/E1/SRR6052133_fq1-0.csv".to_string()]);
}

#[rstest]
#[tokio::test]
async fn resume_before_stage2_still_purges_stale_output(workspace: TestWorkspace) {
    let correction_down = Arc::new(AtomicBool::new(true));
    let flag = correction_down.clone();
    let backend = Arc::new(happy_backend().respond(Stage::Correction, move |_| {
        if flag.load(Ordering::SeqCst) {
            Err("lost contact with worker".into())
        } else {
            Ok(Value::Null)
        }
    }));
    let ctx = execution_context("E1");

    let first = workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(1, 1)).await;
    assert_matches!(first, Err(OrchestratorError::StageFailed { stage: Stage::Correction, .. }));
    workspace.seed(&["csv/E1/stale.csv"]).await;

    correction_down.store(false, Ordering::SeqCst);
    workspace.orchestrator(backend).run_pipeline(&ctx, stage1_inputs(1, 1)).await.unwrap();

    assert!(workspace.keys_under("csv/E1/").await.is_empty());
}

#[rstest]
#[tokio::test]
async fn skip_map_only_reads_existing_output(workspace: TestWorkspace) {
    workspace.seed(&E1_INTERMEDIATES).await;
    workspace.seed(&["csv/E1/SRR6052133_fq1-0.csv"]).await;
    let backend = Arc::new(happy_backend());
    let mut ctx = execution_context("E1");
    ctx.skip_policy = StageSkipPolicy::ReuseOutputOnly;

    workspace.orchestrator(backend.clone()).run_pipeline(&ctx, stage1_inputs(2, 3)).await.unwrap();

    assert!(backend.events().is_empty());
    assert_eq!(workspace.keys_under("csv/").await.len(), 1);
    assert_eq!(workspace.keys_under("map_index_files/E1/").await.len(), 2);
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn cleanup_failures_do_not_fail_the_run(workspace: TestWorkspace) {
    let mut checkpoints = MockCheckpointStore::new();
    checkpoints.expect_load().returning(|_| Ok(None));
    checkpoints.expect_dump().times(3).returning(|_, _| Ok(()));
    checkpoints.expect_delete().times(3).returning(|key| Err(CheckpointError::InvalidKey(key.to_string())));

    let orchestrator = MapOrchestrator::new(
        Arc::new(happy_backend()),
        workspace.storage.clone(),
        Arc::new(checkpoints),
        CheckpointKeys::default(),
    );

    let result = orchestrator.run_pipeline(&execution_context("E1"), stage1_inputs(1, 1)).await;

    assert!(result.is_ok());
    assert!(logs_contain("Failed to delete checkpoint"));
}

#[rstest]
#[tokio::test]
async fn standalone_cleanup_reports_what_it_removed(workspace: TestWorkspace) {
    workspace.seed(&E1_INTERMEDIATES).await;
    let orchestrator = workspace.orchestrator(Arc::new(happy_backend()));

    let report = orchestrator.cleanup(&execution_context("E1")).await;

    assert_eq!(report.deleted_objects, 4);
    assert_eq!(report.deleted_checkpoints, 3);
    assert!(report.is_clean());
}

#[rstest]
#[tokio::test]
async fn runs_end_to_end_on_the_local_executor(workspace: TestWorkspace) {
    let mut map1 = MockStageTask::new();
    map1.expect_run().times(2).returning(|input, _| stage1_tuple(&input).map_err(TaskError::InvalidOutput));
    let mut correction = MockStageTask::new();
    correction.expect_run().times(3).returning(|input, _| Ok(input));
    let mut map2 = MockStageTask::new();
    map2.expect_run().times(2).returning(|input, _| Ok(input));

    let mut registry = TaskRegistry::new();
    registry.register(Stage::Map1.function(), Arc::new(map1));
    registry.register(Stage::Correction.function(), Arc::new(correction));
    registry.register(Stage::Map2.function(), Arc::new(map2));
    let executor = LocalExecutor::new(
        workspace.storage.clone(),
        Arc::new(MockExternalTool::new()),
        registry,
        ExecutorSettings {
            runtime_id: "test-runtime".into(),
            runtime_memory_mb: 1024,
            poll_interval: Duration::from_millis(10),
            work_dir: workspace.dir.path().join("work"),
        },
    );

    workspace.orchestrator(Arc::new(executor)).run_pipeline(&execution_context("E1"), stage1_inputs(1, 2)).await.unwrap();

    // call status objects are kept apart from the intermediate prefixes and survive cleanup
    assert_eq!(workspace.keys_under("executor/").await.len(), 7);
    for stage in Stage::ORDERED {
        assert!(!workspace.has_checkpoint(stage, "E1").await);
    }
}
