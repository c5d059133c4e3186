//! # Blog Pipeline Service
//!
//! Facade the HTTP layer and CLI talk to. Wires the store, registry,
//! coordinator and resume engine together and adds the administrative
//! operations (delete, cleanup).

use super::coordinator::{Coordinator, RunOutcome};
use super::events::{EventBus, PipelineEvent};
use super::executor::{StageOutcome, StageRunner};
use super::registry::ActiveRuns;
use super::resume::{ProcessStatus, ResumeEngine, ResumeStatus};
use super::stage::{PipelineStatus, Stage};
use super::topics::{self, TopicIdea};
use crate::error::{PipelineError, PipelineResult};
use crate::state::{ArtifactStore, Blog, BlogId, BlogPatch};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Topic generation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicList {
    pub blog_id: BlogId,
    pub status: PipelineStatus,
    pub topics: Vec<TopicIdea>,
    /// Set when the stage function failed
    pub error_message: Option<String>,
}

/// Result of a topic pick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSelection {
    pub blog: Blog,
    /// The remaining stages were started in the background
    pub resumed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub blog_id: BlogId,
    pub status: PipelineStatus,
    pub message: String,
    pub progress_percentage: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted: Vec<BlogId>,
    pub kept: usize,
}

/// The pipeline, as seen from the outside
#[derive(Clone)]
pub struct BlogPipeline {
    engine: ResumeEngine,
    auto_resume_on_select: Arc<AtomicBool>,
}

impl BlogPipeline {
    /// New pipeline with an empty run registry
    pub fn new(store: Arc<dyn ArtifactStore>, runner: Arc<dyn StageRunner>) -> Self {
        let coordinator = Coordinator::new(
            store,
            runner,
            Arc::new(ActiveRuns::new()),
            EventBus::default(),
        );
        Self {
            engine: ResumeEngine::new(coordinator),
            auto_resume_on_select: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Start the remaining stages as soon as a topic is picked
    pub fn with_auto_resume(self, enabled: bool) -> Self {
        self.set_auto_resume(enabled);
        self
    }

    /// Shared by every clone of this pipeline
    pub fn set_auto_resume(&self, enabled: bool) {
        self.auto_resume_on_select.store(enabled, Ordering::SeqCst);
    }

    fn coordinator(&self) -> &Coordinator {
        self.engine.coordinator()
    }

    fn store(&self) -> &Arc<dyn ArtifactStore> {
        self.coordinator().store()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.coordinator().events().subscribe()
    }

    pub fn active_ids(&self) -> Vec<BlogId> {
        self.coordinator().active_runs().active_ids()
    }

    pub fn create(&self, title: Option<String>) -> PipelineResult<Blog> {
        let blog = self.store().create(title)?;
        tracing::info!(blog_id = blog.id, "blog created");
        Ok(blog)
    }

    pub fn list(&self) -> PipelineResult<Vec<Blog>> {
        self.store().list()
    }

    pub fn get(&self, id: BlogId) -> PipelineResult<Blog> {
        self.store().get(id)
    }

    /// Remove a blog. Refused while a run holds it.
    pub fn delete(&self, id: BlogId) -> PipelineResult<()> {
        let _guard = self.coordinator().register(id)?;
        self.store().delete(id)?;
        tracing::info!(blog_id = id, "blog deleted");
        Ok(())
    }

    /// Replace the finished post with a human edit. Only completed blogs
    /// accept this; stage completion and status are left alone.
    pub fn update_content(&self, id: BlogId, content: String) -> PipelineResult<Blog> {
        let _guard = self.coordinator().register(id)?;
        let blog = self.store().get(id)?;
        if blog.status != PipelineStatus::Completed {
            return Err(PipelineError::NotCompleted(id));
        }
        let blog = self
            .store()
            .update(id, BlogPatch::new().replace_output(Stage::SeoOptimization, content))?;
        tracing::info!(blog_id = id, "final content replaced");
        Ok(blog)
    }

    /// Delete blogs that never got a topic list. Active blogs are skipped.
    pub fn cleanup_abandoned(&self) -> PipelineResult<CleanupReport> {
        let mut report = CleanupReport::default();
        for blog in self.store().list()? {
            if blog.has_generated_topics() {
                report.kept += 1;
                continue;
            }
            match self.delete(blog.id) {
                Ok(()) => report.deleted.push(blog.id),
                Err(PipelineError::AlreadyActive(_)) => report.kept += 1,
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            deleted = report.deleted.len(),
            kept = report.kept,
            "abandoned blogs cleaned up"
        );
        Ok(report)
    }

    /// Run (or re-run) topic generation and return the parsed list
    pub async fn generate_topics(&self, id: BlogId) -> PipelineResult<TopicList> {
        let outcome = self.coordinator().generate_topics(id).await?;
        let blog = self.store().get(id)?;
        let error_message = match outcome {
            StageOutcome::Failed(message) => Some(message),
            _ => None,
        };
        Ok(TopicList {
            blog_id: id,
            status: blog.status,
            topics: Self::parsed_topics(&blog),
            error_message,
        })
    }

    /// Current topic list without regenerating
    pub fn topics(&self, id: BlogId) -> PipelineResult<Vec<TopicIdea>> {
        let blog = self.store().get(id)?;
        Ok(Self::parsed_topics(&blog))
    }

    fn parsed_topics(blog: &Blog) -> Vec<TopicIdea> {
        blog.output(Stage::TopicGeneration)
            .map(topics::parse_topics)
            .unwrap_or_default()
    }

    pub fn select_topic(&self, id: BlogId, number: usize) -> PipelineResult<TopicSelection> {
        let blog = self.coordinator().select_topic(id, number)?;

        let auto_resume = self.auto_resume_on_select.load(Ordering::SeqCst);
        if !auto_resume || !self.engine.status(id)?.can_resume {
            return Ok(TopicSelection {
                blog,
                resumed: false,
            });
        }

        // Detached; progress is observed through events and status
        self.engine.resume(id)?;
        Ok(TopicSelection {
            blog: self.store().get(id)?,
            resumed: true,
        })
    }

    /// Resume in the background and return the updated blog
    pub fn resume(&self, id: BlogId) -> PipelineResult<Blog> {
        self.engine.resume(id)?;
        self.store().get(id)
    }

    /// Resume and wait for the run to stop
    pub async fn resume_and_wait(&self, id: BlogId) -> PipelineResult<RunOutcome> {
        let handle = self.engine.resume(id)?;
        handle
            .await
            .context("pipeline task panicked")
            .map_err(PipelineError::Storage)?
    }

    pub fn pause(&self, id: BlogId) -> PipelineResult<Blog> {
        self.engine.pause(id)
    }

    pub fn resume_status(&self, id: BlogId) -> PipelineResult<ResumeStatus> {
        self.engine.status(id)
    }

    pub fn process_status(&self, id: BlogId) -> PipelineResult<ProcessStatus> {
        self.engine.process_status(id)
    }

    pub fn progress(&self, id: BlogId) -> PipelineResult<Progress> {
        let blog = self.store().get(id)?;
        Ok(Progress {
            blog_id: id,
            status: blog.status,
            message: blog.status.message().to_string(),
            progress_percentage: blog.step_completion.progress_percentage(),
        })
    }
}
