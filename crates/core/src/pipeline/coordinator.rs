//! # Pipeline Coordinator
//!
//! Owns the active-run registry and drives the sequencer + executor loop for
//! one blog at a time. Runs are spawned as independent tokio tasks; the loop
//! inside a run is strictly sequential.

use super::events::{EventBus, PipelineEvent, PipelineEventKind};
use super::executor::{StageOutcome, StageRunner, StepExecutor};
use super::registry::{ActiveRuns, RunGuard, RunKind};
use super::stage::{PipelineStatus, Stage};
use super::topics;
use crate::error::{PipelineError, PipelineResult};
use crate::state::{ArtifactStore, Blog, BlogId, BlogPatch};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every stage is complete
    Completed,
    /// A stage failed; the blog is `failed`
    Failed(String),
    /// Halted at a stage boundary on request
    Paused,
    /// The next stage needs a selected topic and there is none
    AwaitingTopic,
}

/// Drives runs and guards them with the registry
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn ArtifactStore>,
    executor: StepExecutor,
    runner: Arc<dyn StageRunner>,
    active: Arc<ActiveRuns>,
    events: EventBus,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        runner: Arc<dyn StageRunner>,
        active: Arc<ActiveRuns>,
        events: EventBus,
    ) -> Self {
        let executor = StepExecutor::new(Arc::clone(&store), events.clone());
        Self {
            store,
            executor,
            runner,
            active,
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn active_runs(&self) -> &Arc<ActiveRuns> {
        &self.active
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_active(&self, id: BlogId) -> bool {
        self.active.is_active(id)
    }

    /// Hold `id` for a one-shot operation. Pause requests are refused
    /// while it is held.
    pub fn register(&self, id: BlogId) -> PipelineResult<RunGuard> {
        self.register_as(id, RunKind::Exclusive)
    }

    /// Register a pipeline loop for `id` without starting it
    pub fn register_run(&self, id: BlogId) -> PipelineResult<RunGuard> {
        self.register_as(id, RunKind::Pipeline)
    }

    fn register_as(&self, id: BlogId, kind: RunKind) -> PipelineResult<RunGuard> {
        let guard = self.active.try_register(id, kind)?;
        // Unknown ids must not leave a registration behind; the guard drops here
        self.store.get(id)?;
        Ok(guard)
    }

    /// Register and spawn a background run.
    ///
    /// Fails with `AlreadyActive` if a run is registered; the returned handle
    /// resolves when the loop stops.
    pub fn start(&self, id: BlogId) -> PipelineResult<JoinHandle<PipelineResult<RunOutcome>>> {
        let guard = self.register_run(id)?;
        Ok(self.spawn(guard))
    }

    /// Register and drive a run on the current task
    pub async fn run(&self, id: BlogId) -> PipelineResult<RunOutcome> {
        let guard = self.register_run(id)?;
        self.drive(guard).await
    }

    /// Spawn the loop for an already registered run
    pub fn spawn(&self, guard: RunGuard) -> JoinHandle<PipelineResult<RunOutcome>> {
        let this = self.clone();
        tokio::spawn(async move {
            let id = guard.blog_id();
            let result = this.drive(guard).await;
            if let Err(e) = &result {
                tracing::error!(blog_id = id, error = %e, "pipeline run aborted");
            }
            result
        })
    }

    /// Sequencer -> executor loop. The guard is held for the whole loop and
    /// released when this returns, whatever the outcome.
    #[tracing::instrument(skip(self, guard), fields(blog_id = guard.blog_id()))]
    async fn drive(&self, guard: RunGuard) -> PipelineResult<RunOutcome> {
        let id = guard.blog_id();
        self.mark_started(id)?;

        let outcome = loop {
            let blog = self.store.get(id)?;

            let Some(stage) = blog.next_stage() else {
                self.store.update(
                    id,
                    BlogPatch::new()
                        .status(PipelineStatus::Completed)
                        .paused(false),
                )?;
                break RunOutcome::Completed;
            };

            if guard.pause_requested() {
                self.store.update(
                    id,
                    BlogPatch::new().status(PipelineStatus::Paused).paused(true),
                )?;
                break RunOutcome::Paused;
            }

            if stage.requires_selected_topic() && blog.selected_topic.is_none() {
                tracing::info!(%stage, "waiting for topic selection");
                break RunOutcome::AwaitingTopic;
            }

            if let StageOutcome::Failed(message) =
                self.executor.run_stage(id, stage, self.runner.as_ref()).await?
            {
                break RunOutcome::Failed(message);
            }
        };

        self.emit_outcome(id, &outcome);
        tracing::info!(outcome = ?outcome, "pipeline run finished");
        Ok(outcome)
    }

    fn mark_started(&self, id: BlogId) -> PipelineResult<()> {
        let blog = self.store.get(id)?;
        if blog.process_started_at.is_none() {
            self.store
                .update(id, BlogPatch::new().process_started_at(Utc::now()))?;
        }
        self.events.emit(
            PipelineEvent::new(id, PipelineEventKind::RunStarted)
                .with_status(blog.status)
                .with_message(format!("retry {}", blog.retry_count)),
        );
        Ok(())
    }

    fn emit_outcome(&self, id: BlogId, outcome: &RunOutcome) {
        let event = match outcome {
            RunOutcome::Completed => PipelineEvent::new(id, PipelineEventKind::RunCompleted)
                .with_status(PipelineStatus::Completed)
                .with_message(PipelineStatus::Completed.message()),
            RunOutcome::Failed(message) => PipelineEvent::new(id, PipelineEventKind::RunFailed)
                .with_status(PipelineStatus::Failed)
                .with_message(message.clone()),
            RunOutcome::Paused => PipelineEvent::new(id, PipelineEventKind::RunPaused)
                .with_status(PipelineStatus::Paused)
                .with_message(PipelineStatus::Paused.message()),
            RunOutcome::AwaitingTopic => {
                return;
            }
        };
        self.events.emit(event);
    }

    /// Run `topic_generation` on the current task.
    ///
    /// Regenerates while no topic is selected; once one is, the list is
    /// locked. Holds the registration for the duration of the call.
    pub async fn generate_topics(&self, id: BlogId) -> PipelineResult<StageOutcome> {
        let guard = self.register(id)?;
        let blog = self.store.get(id)?;
        if blog.selected_topic.is_some()
            || blog.step_completion.is_complete(Stage::ContentPlanning)
        {
            return Err(PipelineError::TopicLocked(id));
        }
        self.mark_started(id)?;

        let outcome = if blog.has_generated_topics() {
            tracing::info!(blog_id = id, "regenerating topics");
            self.executor
                .refresh_stage(id, Stage::TopicGeneration, self.runner.as_ref())
                .await?
        } else {
            self.executor
                .run_stage(id, Stage::TopicGeneration, self.runner.as_ref())
                .await?
        };

        drop(guard);
        Ok(outcome)
    }

    /// Pick topic `number` (1-based) from the generated list.
    ///
    /// Re-selecting the same topic is a no-op; a different pick is refused once
    /// content planning has completed.
    pub fn select_topic(&self, id: BlogId, number: usize) -> PipelineResult<Blog> {
        let _guard = self.register(id)?;
        let blog = self.store.get(id)?;

        if blog.step_completion.is_complete(Stage::ContentPlanning) {
            return match &blog.selected_topic {
                Some(current) if current.number == number => Ok(blog),
                _ => Err(PipelineError::TopicLocked(id)),
            };
        }

        let raw = blog
            .output(Stage::TopicGeneration)
            .ok_or_else(|| PipelineError::InvalidTopicSelection {
                id,
                reason: "no topics generated yet".to_string(),
            })?;
        let ideas = topics::parse_topics(raw);
        let selected = topics::select_topic(&ideas, number).ok_or_else(|| {
            PipelineError::InvalidTopicSelection {
                id,
                reason: format!("pick a number between 1 and {}", ideas.len()),
            }
        })?;

        let title = selected.title.clone();
        let blog = self.store.update(
            id,
            BlogPatch::new()
                .title(title.clone())
                .selected_topic(selected),
        )?;
        tracing::info!(blog_id = id, number, title = %title, "topic selected");
        self.events.emit(
            PipelineEvent::new(id, PipelineEventKind::TopicSelected).with_message(title),
        );
        Ok(blog)
    }
}
