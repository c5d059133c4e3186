//! End-to-end pipeline scenarios against both stores.

use async_trait::async_trait;
use inkflow_core::pipeline::{
    ActiveRuns, BlogPipeline, Coordinator, EventBus, PipelineEventKind, PipelineStatus, RunOutcome,
    Stage, StageInput, StageRunner,
};
use inkflow_core::state::{
    ArtifactStore, BlogId, BlogPatch, MemoryArtifactStore, PipelineDb, SqliteArtifactStore,
};
use inkflow_core::PipelineError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Barrier, Notify};

const TOPICS: &str = r#"[
    {"title": "Zero-Copy Parsing in Practice", "category": "Systems"},
    {"title": "Backpressure Explained", "category": "Networking"}
]"#;

/// Each stage appends its name to the previous artifact so the chain is
/// visible in the final output.
#[derive(Default)]
struct ChainRunner {
    calls: Mutex<Vec<Stage>>,
    fail_once: Mutex<HashSet<Stage>>,
    gate: Option<(Stage, Arc<Notify>)>,
}

impl ChainRunner {
    fn failing_once(stage: Stage) -> Self {
        let runner = Self::default();
        runner.fail_once.lock().unwrap().insert(stage);
        runner
    }

    fn gated(stage: Stage, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some((stage, gate)),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageRunner for ChainRunner {
    async fn run(&self, stage: Stage, input: &StageInput) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(stage);

        if let Some((gated, gate)) = &self.gate {
            if *gated == stage {
                gate.notified().await;
            }
        }
        if self.fail_once.lock().unwrap().remove(&stage) {
            anyhow::bail!("{} timed out", stage);
        }

        Ok(match stage {
            Stage::TopicGeneration => TOPICS.to_string(),
            Stage::ContentPlanning => {
                let topic = input.selected_topic.as_ref().map(|t| t.title.as_str());
                format!("plan[{}]", topic.unwrap_or("?"))
            }
            other => format!(
                "{}[{}]",
                other,
                input.previous_artifact(other).unwrap_or("?")
            ),
        })
    }
}

fn sqlite_store(dir: &tempfile::TempDir) -> Arc<dyn ArtifactStore> {
    let db = PipelineDb::open_at(dir.path().join("inkflow.db")).unwrap();
    Arc::new(SqliteArtifactStore::new(&db))
}

async fn wait_for(
    rx: &mut broadcast::Receiver<inkflow_core::pipeline::PipelineEvent>,
    id: BlogId,
    kind: PipelineEventKind,
    stage: Option<Stage>,
) {
    loop {
        let event = rx.recv().await.unwrap();
        if event.blog_id == id && event.kind == kind && (stage.is_none() || event.stage == stage) {
            return;
        }
    }
}

/// Create a blog, generate topics and pick the first one
async fn blog_with_topic(pipeline: &BlogPipeline) -> BlogId {
    let blog = pipeline.create(None).unwrap();
    pipeline.generate_topics(blog.id).await.unwrap();
    pipeline.select_topic(blog.id, 1).unwrap();
    blog.id
}

#[tokio::test]
async fn test_full_run_builds_each_stage_on_the_previous() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ChainRunner::default());
    let pipeline = BlogPipeline::new(sqlite_store(&dir), runner.clone()).with_auto_resume(false);

    let id = blog_with_topic(&pipeline).await;
    let outcome = pipeline.resume_and_wait(id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    assert_eq!(runner.calls(), Stage::ALL.to_vec());

    let blog = pipeline.get(id).unwrap();
    assert_eq!(blog.status, PipelineStatus::Completed);
    assert!(blog.step_completion.all_complete());
    assert!(!blog.is_paused);
    assert_eq!(blog.title.as_deref(), Some("Zero-Copy Parsing in Practice"));
    assert_eq!(
        blog.output(Stage::SeoOptimization),
        Some("seo_optimization[editing[drafting[plan[Zero-Copy Parsing in Practice]]]]")
    );
    assert!(blog.process_started_at.is_some());
}

#[tokio::test]
async fn test_failure_then_resume_reruns_only_the_failed_stage() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ChainRunner::failing_once(Stage::Drafting));
    let pipeline = BlogPipeline::new(sqlite_store(&dir), runner.clone()).with_auto_resume(false);

    let id = blog_with_topic(&pipeline).await;
    let outcome = pipeline.resume_and_wait(id).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Failed(ref msg) if msg.contains("drafting timed out")));

    let failed = pipeline.get(id).unwrap();
    assert_eq!(failed.status, PipelineStatus::Failed);
    assert!(failed.step_completion.is_complete(Stage::ContentPlanning));
    assert!(!failed.step_completion.is_complete(Stage::Drafting));
    assert!(failed.error_message.is_some());
    let plan = failed.output(Stage::ContentPlanning).unwrap().to_string();

    let status = pipeline.resume_status(id).unwrap();
    assert!(status.can_resume);
    assert_eq!(status.reason, "can resume failed pipeline");
    assert_eq!(status.action_needed, Some(Stage::Drafting));

    let outcome = pipeline.resume_and_wait(id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let calls = runner.calls();
    assert_eq!(calls.iter().filter(|s| **s == Stage::ContentPlanning).count(), 1);
    assert_eq!(calls.iter().filter(|s| **s == Stage::Drafting).count(), 2);

    let done = pipeline.get(id).unwrap();
    assert_eq!(done.output(Stage::ContentPlanning), Some(plan.as_str()));
    assert_eq!(done.retry_count, 2);
    assert!(done.error_message.is_none());
}

#[tokio::test]
async fn test_pause_halts_after_in_flight_stage_and_resume_continues() {
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ChainRunner::gated(Stage::Editing, gate.clone()));
    let pipeline = BlogPipeline::new(Arc::new(MemoryArtifactStore::new()), runner.clone())
        .with_auto_resume(false);
    let mut rx = pipeline.subscribe();

    let id = blog_with_topic(&pipeline).await;
    pipeline.resume(id).unwrap();
    wait_for(&mut rx, id, PipelineEventKind::StageStarted, Some(Stage::Editing)).await;

    let paused = pipeline.pause(id).unwrap();
    assert!(paused.is_paused);

    gate.notify_one();
    wait_for(&mut rx, id, PipelineEventKind::RunPaused, None).await;

    let process = pipeline.process_status(id).unwrap();
    assert_eq!(process.status, PipelineStatus::Paused);
    assert!(process.is_paused);
    assert!(!process.is_pipeline_active);
    assert!(process.step_completion[&Stage::Editing]);
    assert!(!process.step_completion[&Stage::SeoOptimization]);
    assert_eq!(process.resume_status.reason, "pipeline was paused");
    assert_eq!(process.resume_status.action_needed, Some(Stage::SeoOptimization));

    let outcome = pipeline.resume_and_wait(id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let calls = runner.calls();
    assert_eq!(calls.iter().filter(|s| **s == Stage::Editing).count(), 1);
    assert_eq!(calls.last(), Some(&Stage::SeoOptimization));
    assert!(!pipeline.get(id).unwrap().is_paused);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_starts_yield_one_run() {
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ChainRunner::gated(Stage::ContentPlanning, gate.clone()));
    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
    let coordinator = Coordinator::new(
        store,
        runner.clone(),
        Arc::new(ActiveRuns::new()),
        EventBus::default(),
    );

    let blog = coordinator.store().create(None).unwrap();
    coordinator.generate_topics(blog.id).await.unwrap();
    coordinator.select_topic(blog.id, 2).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = coordinator.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                coordinator.start(blog.id)
            })
        })
        .collect();

    let mut runs = Vec::new();
    let mut rejected = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(handle) => runs.push(handle),
            Err(PipelineError::AlreadyActive(id)) => {
                assert_eq!(id, blog.id);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(runs.len(), 1);
    assert_eq!(rejected, 1);
    assert!(coordinator.is_active(blog.id));

    gate.notify_one();
    let run = runs.pop().unwrap();
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Completed);
    assert!(!coordinator.is_active(blog.id));

    let planning_calls = runner
        .calls()
        .into_iter()
        .filter(|s| *s == Stage::ContentPlanning)
        .count();
    assert_eq!(planning_calls, 1);
}

#[tokio::test]
async fn test_pause_during_topic_generation_is_refused() {
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ChainRunner::gated(Stage::TopicGeneration, gate.clone()));
    let pipeline = BlogPipeline::new(Arc::new(MemoryArtifactStore::new()), runner)
        .with_auto_resume(false);
    let mut rx = pipeline.subscribe();
    let blog = pipeline.create(None).unwrap();

    let generating = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.generate_topics(blog.id).await }
    });
    wait_for(&mut rx, blog.id, PipelineEventKind::StageStarted, Some(Stage::TopicGeneration)).await;

    assert!(pipeline.active_ids().contains(&blog.id));
    assert!(matches!(pipeline.pause(blog.id), Err(PipelineError::NotActive(_))));

    gate.notify_one();
    let list = generating.await.unwrap().unwrap();
    assert_eq!(list.topics.len(), 2);
    pipeline.select_topic(blog.id, 1).unwrap();

    let process = pipeline.process_status(blog.id).unwrap();
    assert!(!process.is_paused);
    assert!(!process.is_pipeline_active);
    assert_eq!(process.resume_status.reason, "can resume pipeline");
}

#[tokio::test]
async fn test_resume_refused_while_running() {
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(ChainRunner::gated(Stage::Drafting, gate.clone()));
    let pipeline = BlogPipeline::new(Arc::new(MemoryArtifactStore::new()), runner)
        .with_auto_resume(false);
    let mut rx = pipeline.subscribe();

    let id = blog_with_topic(&pipeline).await;
    pipeline.resume(id).unwrap();
    wait_for(&mut rx, id, PipelineEventKind::StageStarted, Some(Stage::Drafting)).await;

    let err = pipeline.resume(id).unwrap_err();
    assert!(matches!(err, PipelineError::NotResumable { ref reason, .. } if reason == "already running"));
    assert_eq!(pipeline.get(id).unwrap().retry_count, 1);

    gate.notify_one();
    wait_for(&mut rx, id, PipelineEventKind::RunCompleted, None).await;
}

#[tokio::test]
async fn test_completed_blog_is_not_mutated_by_resume_or_pause() {
    let pipeline = BlogPipeline::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(ChainRunner::default()),
    )
    .with_auto_resume(false);

    let id = blog_with_topic(&pipeline).await;
    pipeline.resume_and_wait(id).await.unwrap();
    let before = pipeline.get(id).unwrap();

    assert!(matches!(
        pipeline.resume(id),
        Err(PipelineError::NotResumable { ref reason, .. }) if reason == "already completed"
    ));
    assert!(matches!(pipeline.pause(id), Err(PipelineError::NotActive(_))));

    let after = pipeline.get(id).unwrap();
    assert_eq!(after.retry_count, before.retry_count);
    assert_eq!(after.last_activity, before.last_activity);
    assert_eq!(after.is_paused, before.is_paused);
    assert_eq!(after.stage_outputs, before.stage_outputs);
}

#[tokio::test]
async fn test_pause_without_run_has_no_side_effects() {
    let pipeline = BlogPipeline::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(ChainRunner::default()),
    );
    let blog = pipeline.create(Some("draft".to_string())).unwrap();

    assert!(matches!(pipeline.pause(blog.id), Err(PipelineError::NotActive(_))));
    assert!(matches!(pipeline.pause(404), Err(PipelineError::NotActive(_))));

    let after = pipeline.get(blog.id).unwrap();
    assert!(!after.is_paused);
    assert_eq!(after.status, PipelineStatus::Pending);
    assert_eq!(after.last_activity, blog.last_activity);
}

#[tokio::test]
async fn test_resume_without_topic_is_refused() {
    let pipeline = BlogPipeline::new(
        Arc::new(MemoryArtifactStore::new()),
        Arc::new(ChainRunner::default()),
    );
    let blog = pipeline.create(None).unwrap();

    let status = pipeline.resume_status(blog.id).unwrap();
    assert!(!status.can_resume);
    assert_eq!(status.reason, "topic not selected");
    assert!(matches!(
        pipeline.resume(blog.id),
        Err(PipelineError::NotResumable { .. })
    ));
}

#[tokio::test]
async fn test_completion_only_grows_as_a_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ChainRunner::failing_once(Stage::Editing));
    let pipeline = BlogPipeline::new(sqlite_store(&dir), runner).with_auto_resume(false);
    let mut rx = pipeline.subscribe();

    let id = blog_with_topic(&pipeline).await;
    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline.resume_and_wait(id).await.unwrap();
            pipeline.resume_and_wait(id).await.unwrap()
        }
    });

    let mut last_count = pipeline.get(id).unwrap().step_completion.completed_count();
    loop {
        let event = rx.recv().await.unwrap();
        let completion = pipeline.get(id).unwrap().step_completion;
        assert!(completion.is_prefix());
        assert!(completion.completed_count() >= last_count);
        last_count = completion.completed_count();
        if event.kind == PipelineEventKind::RunCompleted {
            break;
        }
    }

    assert_eq!(handle.await.unwrap(), RunOutcome::Completed);
    assert_eq!(last_count, Stage::ALL.len());
}

#[tokio::test]
async fn test_restart_recovers_interrupted_run() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let pipeline = BlogPipeline::new(
            sqlite_store(&dir),
            Arc::new(ChainRunner::default()),
        )
        .with_auto_resume(false);
        let id = blog_with_topic(&pipeline).await;

        // Simulate a crash mid-drafting: status says drafting, nothing registered
        let store = sqlite_store(&dir);
        store
            .update(
                id,
                BlogPatch::new()
                    .stage_output(Stage::ContentPlanning, "plan[crashed run]")
                    .status(PipelineStatus::Drafting),
            )
            .unwrap();
        id
    };

    let runner = Arc::new(ChainRunner::default());
    let restarted = BlogPipeline::new(sqlite_store(&dir), runner.clone()).with_auto_resume(false);

    let status = restarted.resume_status(id).unwrap();
    assert!(status.can_resume);
    assert_eq!(status.action_needed, Some(Stage::Drafting));
    assert!(restarted.active_ids().is_empty());

    assert_eq!(restarted.resume_and_wait(id).await.unwrap(), RunOutcome::Completed);
    assert_eq!(
        runner.calls(),
        vec![Stage::Drafting, Stage::Editing, Stage::SeoOptimization]
    );

    let blog = restarted.get(id).unwrap();
    assert_eq!(
        blog.output(Stage::Drafting),
        Some("drafting[plan[crashed run]]")
    );
}
