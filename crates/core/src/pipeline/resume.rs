//! # Resume Engine
//!
//! Decides whether a blog's pipeline may proceed right now and performs the
//! pause/resume transitions. All resume decisions go through
//! [`resume_status`]; `resume` refuses with the same reason string.

use super::coordinator::{Coordinator, RunOutcome};
use super::events::{PipelineEvent, PipelineEventKind};
use super::stage::{PipelineStatus, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::state::{Blog, BlogId, BlogPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::task::JoinHandle;

pub const REASON_TOPIC_NOT_SELECTED: &str = "topic not selected";
pub const REASON_ALREADY_RUNNING: &str = "already running";
pub const REASON_ALREADY_COMPLETED: &str = "already completed";

/// Answer to "can this blog's pipeline proceed right now?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeStatus {
    pub can_resume: bool,
    pub reason: String,
    /// Stage a resume would start at
    pub action_needed: Option<Stage>,
}

impl ResumeStatus {
    fn refused(reason: &str) -> Self {
        Self {
            can_resume: false,
            reason: reason.to_string(),
            action_needed: None,
        }
    }
}

/// Evaluate resumability. Checks run in a fixed order: topic, active run,
/// completion.
pub fn resume_status(blog: &Blog, is_active: bool) -> ResumeStatus {
    if blog.selected_topic.is_none() {
        return ResumeStatus::refused(REASON_TOPIC_NOT_SELECTED);
    }
    if is_active {
        return ResumeStatus::refused(REASON_ALREADY_RUNNING);
    }
    let next = match blog.next_stage() {
        Some(stage) if blog.status != PipelineStatus::Completed => stage,
        _ => return ResumeStatus::refused(REASON_ALREADY_COMPLETED),
    };

    let reason = match blog.status {
        PipelineStatus::Failed => "can resume failed pipeline",
        PipelineStatus::Paused => "pipeline was paused",
        _ => "can resume pipeline",
    };
    ResumeStatus {
        can_resume: true,
        reason: reason.to_string(),
        action_needed: Some(next),
    }
}

/// Snapshot of a blog's run state for status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub blog_id: BlogId,
    pub status: PipelineStatus,
    pub message: String,
    pub step_completion: BTreeMap<Stage, bool>,
    pub progress_percentage: u8,
    pub retry_count: u32,
    pub is_paused: bool,
    pub is_pipeline_active: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub process_started_at: Option<DateTime<Utc>>,
    pub resume_status: ResumeStatus,
}

/// Pause/resume transitions on top of the coordinator
#[derive(Clone)]
pub struct ResumeEngine {
    coordinator: Coordinator,
}

impl ResumeEngine {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn status(&self, id: BlogId) -> PipelineResult<ResumeStatus> {
        let blog = self.coordinator.store().get(id)?;
        Ok(resume_status(&blog, self.coordinator.is_active(id)))
    }

    /// Re-enter the loop at the first incomplete stage.
    ///
    /// Returns once the run is registered; the loop continues in the
    /// background and the handle resolves with its outcome.
    pub fn resume(&self, id: BlogId) -> PipelineResult<JoinHandle<PipelineResult<RunOutcome>>> {
        let status = self.status(id)?;
        if !status.can_resume {
            tracing::info!(blog_id = id, reason = %status.reason, "resume refused");
            return Err(PipelineError::NotResumable {
                id,
                reason: status.reason,
            });
        }

        // A concurrent resume may have won since the check
        let guard = self.coordinator.register_run(id)?;
        let store = self.coordinator.store();
        let blog = store.get(id)?;

        // A run that finished between the check and the registration may
        // have completed the blog
        let status = resume_status(&blog, false);
        if !status.can_resume {
            drop(guard);
            tracing::info!(blog_id = id, reason = %status.reason, "resume refused");
            return Err(PipelineError::NotResumable {
                id,
                reason: status.reason,
            });
        }

        let blog = store.update(
            id,
            BlogPatch::new()
                .retry_count(blog.retry_count.saturating_add(1))
                .paused(false)
                .clear_error(),
        )?;
        tracing::info!(
            blog_id = id,
            retry_count = blog.retry_count,
            next_stage = ?status.action_needed,
            "resuming pipeline"
        );

        Ok(self.coordinator.spawn(guard))
    }

    /// Ask the active run to halt after its in-flight stage.
    ///
    /// Refused with `NotActive`, and nothing written, when no run is active.
    pub fn pause(&self, id: BlogId) -> PipelineResult<Blog> {
        let active = self.coordinator.active_runs();
        if !active.request_pause(id) {
            return Err(PipelineError::NotActive(id));
        }

        let store = self.coordinator.store();
        let mut blog = store.update(id, BlogPatch::new().paused(true))?;
        self.coordinator.events().emit(
            PipelineEvent::new(id, PipelineEventKind::PauseRequested)
                .with_status(blog.status)
                .with_message("Pause requested; stopping after the current stage"),
        );
        tracing::info!(blog_id = id, status = %blog.status, "pause requested");

        // The loop may have written its last stage between the request and the write
        if blog.status == PipelineStatus::Completed {
            blog = store.update(id, BlogPatch::new().paused(false))?;
        }
        Ok(blog)
    }

    pub fn process_status(&self, id: BlogId) -> PipelineResult<ProcessStatus> {
        let blog = self.coordinator.store().get(id)?;
        let is_active = self.coordinator.is_active(id);
        let resume_status = resume_status(&blog, is_active);

        Ok(ProcessStatus {
            blog_id: blog.id,
            status: blog.status,
            message: blog.status.message().to_string(),
            step_completion: blog.step_completion.snapshot(),
            progress_percentage: blog.step_completion.progress_percentage(),
            retry_count: blog.retry_count,
            is_paused: blog.is_paused,
            is_pipeline_active: is_active,
            error_message: blog.error_message,
            created_at: blog.created_at,
            last_activity: blog.last_activity,
            process_started_at: blog.process_started_at,
            resume_status,
        })
    }
}
