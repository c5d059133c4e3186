//! # Step Executor
//!
//! Runs exactly one stage function against a blog's accumulated artifacts and
//! does the before/after bookkeeping. Stage failures are captured here and
//! persisted; they never escape as errors.

use super::events::{EventBus, PipelineEvent, PipelineEventKind};
use super::stage::{PipelineStatus, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::state::{ArtifactStore, Blog, BlogId, BlogPatch, SelectedTopic};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a stage function may read
#[derive(Debug, Clone)]
pub struct StageInput {
    pub blog_id: BlogId,
    pub title: Option<String>,
    pub selected_topic: Option<SelectedTopic>,
    pub artifacts: BTreeMap<Stage, String>,
}

impl StageInput {
    pub fn from_blog(blog: &Blog) -> Self {
        Self {
            blog_id: blog.id,
            title: blog.title.clone(),
            selected_topic: blog.selected_topic.clone(),
            artifacts: blog.stage_outputs.clone(),
        }
    }

    pub fn artifact(&self, stage: Stage) -> Option<&str> {
        self.artifacts.get(&stage).map(String::as_str)
    }

    /// Artifact of the stage right before `stage`
    pub fn previous_artifact(&self, stage: Stage) -> Option<&str> {
        stage.previous().and_then(|prev| self.artifact(prev))
    }
}

/// A stage function: accumulated artifacts in, new artifact out.
///
/// Implementations call the LLM provider; the pipeline treats them as opaque.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, stage: Stage, input: &StageInput) -> anyhow::Result<String>;
}

/// Result of one `run_stage` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage function ran and its artifact was persisted
    Completed { artifact: String, duration: Duration },
    /// Stage was already complete; the stored artifact is returned untouched
    Cached(String),
    /// Stage function failed; the blog is now `failed`
    Failed(String),
}

impl StageOutcome {
    pub fn artifact(&self) -> Option<&str> {
        match self {
            Self::Completed { artifact, .. } | Self::Cached(artifact) => Some(artifact),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Single-stage runner with uniform bookkeeping
#[derive(Clone)]
pub struct StepExecutor {
    store: Arc<dyn ArtifactStore>,
    events: EventBus,
}

impl StepExecutor {
    pub fn new(store: Arc<dyn ArtifactStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Run `stage` for a blog unless it already completed.
    ///
    /// Errors are storage failures or calling out of order; a failing stage
    /// function is reported as [`StageOutcome::Failed`].
    pub async fn run_stage(
        &self,
        id: BlogId,
        stage: Stage,
        runner: &dyn StageRunner,
    ) -> PipelineResult<StageOutcome> {
        let blog = self.store.get(id)?;
        if blog.step_completion.is_complete(stage) {
            if let Some(cached) = blog.output(stage) {
                tracing::debug!(blog_id = id, %stage, "stage already complete, returning cached artifact");
                return Ok(StageOutcome::Cached(cached.to_string()));
            }
        }
        self.execute(blog, stage, runner).await
    }

    /// Re-run a stage even if it completed, overwriting its artifact.
    ///
    /// Only topic regeneration uses this, before any topic is selected.
    pub(crate) async fn refresh_stage(
        &self,
        id: BlogId,
        stage: Stage,
        runner: &dyn StageRunner,
    ) -> PipelineResult<StageOutcome> {
        let blog = self.store.get(id)?;
        self.execute(blog, stage, runner).await
    }

    async fn execute(
        &self,
        blog: Blog,
        stage: Stage,
        runner: &dyn StageRunner,
    ) -> PipelineResult<StageOutcome> {
        let id = blog.id;
        if let Some(missing) = stage.previous().filter(|p| !blog.step_completion.is_complete(*p)) {
            return Err(PipelineError::StageOrder { stage, missing });
        }

        let blog = self
            .store
            .update(id, BlogPatch::new().status(PipelineStatus::from_stage(stage)))?;
        self.events.emit(
            PipelineEvent::new(id, PipelineEventKind::StageStarted)
                .with_stage(stage)
                .with_message(PipelineStatus::from_stage(stage).message()),
        );
        tracing::info!(blog_id = id, %stage, "running stage");

        let input = StageInput::from_blog(&blog);
        let started = Instant::now();
        let result = runner.run(stage, &input).await;
        let duration = started.elapsed();

        let artifact = match result {
            Ok(artifact) if !artifact.trim().is_empty() => artifact,
            Ok(_) => {
                return self
                    .record_failure(id, stage, PipelineError::EmptyArtifact(stage).to_string())
                    .await
            }
            Err(e) => {
                return self
                    .record_failure(id, stage, format!("{} failed: {:#}", stage, e))
                    .await
            }
        };

        let next_status = PipelineStatus::after(stage);
        self.store.update(
            id,
            BlogPatch::new()
                .stage_output(stage, artifact.clone())
                .status(next_status)
                .clear_error(),
        )?;

        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(blog_id = id, %stage, duration_ms, "stage completed");
        self.events.emit(
            PipelineEvent::new(id, PipelineEventKind::StageCompleted)
                .with_stage(stage)
                .with_status(next_status)
                .with_duration_ms(duration_ms),
        );

        Ok(StageOutcome::Completed { artifact, duration })
    }

    async fn record_failure(
        &self,
        id: BlogId,
        stage: Stage,
        message: String,
    ) -> PipelineResult<StageOutcome> {
        tracing::warn!(blog_id = id, %stage, error = %message, "stage failed");
        self.store.update(
            id,
            BlogPatch::new()
                .status(PipelineStatus::Failed)
                .error(message.clone()),
        )?;
        self.events.emit(
            PipelineEvent::new(id, PipelineEventKind::StageFailed)
                .with_stage(stage)
                .with_status(PipelineStatus::Failed)
                .with_message(message.clone()),
        );
        Ok(StageOutcome::Failed(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryArtifactStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the previous artifact with a stage prefix, counting calls
    struct EchoRunner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StageRunner for EchoRunner {
        async fn run(&self, stage: Stage, input: &StageInput) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prev = input.previous_artifact(stage).unwrap_or("seed");
            Ok(format!("{}({})", stage, prev))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl StageRunner for FailingRunner {
        async fn run(&self, _stage: Stage, _input: &StageInput) -> anyhow::Result<String> {
            anyhow::bail!("provider returned 503")
        }
    }

    struct BlankRunner;

    #[async_trait]
    impl StageRunner for BlankRunner {
        async fn run(&self, _stage: Stage, _input: &StageInput) -> anyhow::Result<String> {
            Ok("\n".to_string())
        }
    }

    fn setup() -> (Arc<MemoryArtifactStore>, StepExecutor) {
        let store = Arc::new(MemoryArtifactStore::new());
        let executor = StepExecutor::new(store.clone(), EventBus::default());
        (store, executor)
    }

    #[tokio::test]
    async fn test_success_persists_and_advances() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();
        let runner = EchoRunner { calls: AtomicUsize::new(0) };

        let outcome = executor
            .run_stage(blog.id, Stage::TopicGeneration, &runner)
            .await
            .unwrap();
        assert_eq!(outcome.artifact(), Some("topic_generation(seed)"));

        let blog = store.get(blog.id).unwrap();
        assert!(blog.step_completion.is_complete(Stage::TopicGeneration));
        assert_eq!(blog.status, PipelineStatus::ContentPlanning);
        assert!(blog.error_message.is_none());
    }

    #[tokio::test]
    async fn test_completed_stage_is_not_rerun() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();
        let runner = EchoRunner { calls: AtomicUsize::new(0) };

        executor
            .run_stage(blog.id, Stage::TopicGeneration, &runner)
            .await
            .unwrap();
        let second = executor
            .run_stage(blog.id, Stage::TopicGeneration, &runner)
            .await
            .unwrap();

        assert_eq!(second, StageOutcome::Cached("topic_generation(seed)".to_string()));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_marks_failed_without_completion() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();
        store
            .update(
                blog.id,
                BlogPatch::new().stage_output(Stage::TopicGeneration, "topics"),
            )
            .unwrap();

        let outcome = executor
            .run_stage(blog.id, Stage::ContentPlanning, &FailingRunner)
            .await
            .unwrap();
        assert!(outcome.is_failed());

        let blog = store.get(blog.id).unwrap();
        assert_eq!(blog.status, PipelineStatus::Failed);
        assert!(!blog.step_completion.is_complete(Stage::ContentPlanning));
        assert!(blog
            .error_message
            .as_deref()
            .unwrap()
            .contains("provider returned 503"));
    }

    #[tokio::test]
    async fn test_blank_artifact_counts_as_failure() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();

        let outcome = executor
            .run_stage(blog.id, Stage::TopicGeneration, &BlankRunner)
            .await
            .unwrap();
        assert!(outcome.is_failed());
        assert!(store.get(blog.id).unwrap().stage_outputs.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_is_refused_before_invoking() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();
        let runner = EchoRunner { calls: AtomicUsize::new(0) };

        let err = executor
            .run_stage(blog.id, Stage::Drafting, &runner)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageOrder { .. }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(blog.id).unwrap().status, PipelineStatus::Pending);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();
        executor
            .run_stage(blog.id, Stage::TopicGeneration, &FailingRunner)
            .await
            .unwrap();

        let runner = EchoRunner { calls: AtomicUsize::new(0) };
        executor
            .run_stage(blog.id, Stage::TopicGeneration, &runner)
            .await
            .unwrap();
        assert!(store.get(blog.id).unwrap().error_message.is_none());
    }

    #[tokio::test]
    async fn test_refresh_overwrites_artifact() {
        let (store, executor) = setup();
        let blog = store.create(None).unwrap();
        store
            .update(
                blog.id,
                BlogPatch::new().stage_output(Stage::TopicGeneration, "old topics"),
            )
            .unwrap();
        let runner = EchoRunner { calls: AtomicUsize::new(0) };

        executor
            .refresh_stage(blog.id, Stage::TopicGeneration, &runner)
            .await
            .unwrap();
        let blog = store.get(blog.id).unwrap();
        assert_eq!(blog.output(Stage::TopicGeneration), Some("topic_generation(seed)"));
        assert!(blog.step_completion.is_complete(Stage::TopicGeneration));
    }
}
