//! # Blog Work Unit
//!
//! One record per content piece: every stage artifact plus the bookkeeping the
//! resume engine needs. Mutations go through [`BlogPatch`] so every backend
//! enforces the same invariants.

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{PipelineStatus, Stage, StepCompletion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Work unit identifier, assigned by the store
pub type BlogId = i64;

/// The topic a human picked from the generated list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedTopic {
    /// 1-based position in the generated list
    pub number: usize,
    pub title: String,
    #[serde(default)]
    pub category: String,
    /// Summary, angle and audience notes fed to the planner
    pub details: String,
}

/// A blog moving through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: BlogId,
    #[serde(default)]
    pub title: Option<String>,
    pub status: PipelineStatus,
    /// Artifact per completed stage
    #[serde(default)]
    pub stage_outputs: BTreeMap<Stage, String>,
    #[serde(default)]
    pub step_completion: StepCompletion,
    #[serde(default)]
    pub selected_topic: Option<SelectedTopic>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub process_started_at: Option<DateTime<Utc>>,
}

impl Blog {
    /// Fresh unit in `pending` with nothing completed
    pub fn new(id: BlogId, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            status: PipelineStatus::Pending,
            stage_outputs: BTreeMap::new(),
            step_completion: StepCompletion::new(),
            selected_topic: None,
            retry_count: 0,
            is_paused: false,
            error_message: None,
            created_at: now,
            last_activity: now,
            process_started_at: None,
        }
    }

    pub fn output(&self, stage: Stage) -> Option<&str> {
        self.stage_outputs.get(&stage).map(String::as_str)
    }

    pub fn next_stage(&self) -> Option<Stage> {
        self.step_completion.next_stage()
    }

    pub fn has_generated_topics(&self) -> bool {
        self.step_completion.is_complete(Stage::TopicGeneration)
    }

    /// Apply a partial mutation. Either the whole patch lands or nothing does.
    pub fn apply(&mut self, patch: BlogPatch) -> PipelineResult<()> {
        let mut next = self.clone();

        if let Some((stage, artifact)) = patch.stage_output {
            if artifact.trim().is_empty() {
                return Err(PipelineError::EmptyArtifact(stage));
            }
            next.step_completion.mark_complete(stage)?;
            next.stage_outputs.insert(stage, artifact);
        }
        if let Some((stage, artifact)) = patch.replaced_output {
            if artifact.trim().is_empty() {
                return Err(PipelineError::EmptyArtifact(stage));
            }
            if !next.step_completion.is_complete(stage) {
                return Err(PipelineError::NotCompleted(next.id));
            }
            next.stage_outputs.insert(stage, artifact);
        }
        if let Some(title) = patch.title {
            next.title = Some(title);
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(topic) = patch.selected_topic {
            next.selected_topic = Some(topic);
        }
        if let Some(retry_count) = patch.retry_count {
            next.retry_count = retry_count;
        }
        if let Some(is_paused) = patch.is_paused {
            next.is_paused = is_paused;
        }
        if let Some(error_message) = patch.error_message {
            next.error_message = error_message;
        }
        if let Some(started) = patch.process_started_at {
            next.process_started_at = Some(started);
        }
        if next.status == PipelineStatus::Completed && !next.step_completion.all_complete() {
            let missing = next.step_completion.next_stage().unwrap_or(Stage::SeoOptimization);
            return Err(PipelineError::StageOrder {
                stage: Stage::SeoOptimization,
                missing,
            });
        }

        next.last_activity = Utc::now();
        *self = next;
        Ok(())
    }
}

/// Partial update for a [`Blog`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BlogPatch {
    pub title: Option<String>,
    pub status: Option<PipelineStatus>,
    /// Persist an artifact and mark its stage complete in one step
    pub stage_output: Option<(Stage, String)>,
    /// Overwrite the artifact of an already completed stage
    pub replaced_output: Option<(Stage, String)>,
    pub selected_topic: Option<SelectedTopic>,
    pub retry_count: Option<u32>,
    pub is_paused: Option<bool>,
    /// `Some(None)` clears the message
    pub error_message: Option<Option<String>>,
    pub process_started_at: Option<DateTime<Utc>>,
}

impl BlogPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: PipelineStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn stage_output(mut self, stage: Stage, artifact: impl Into<String>) -> Self {
        self.stage_output = Some((stage, artifact.into()));
        self
    }

    pub fn replace_output(mut self, stage: Stage, artifact: impl Into<String>) -> Self {
        self.replaced_output = Some((stage, artifact.into()));
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn selected_topic(mut self, topic: SelectedTopic) -> Self {
        self.selected_topic = Some(topic);
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn paused(mut self, is_paused: bool) -> Self {
        self.is_paused = Some(is_paused);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    pub fn process_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.process_started_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_blog_is_pending() {
        let blog = Blog::new(1, None);
        assert_eq!(blog.status, PipelineStatus::Pending);
        assert_eq!(blog.next_stage(), Some(Stage::TopicGeneration));
        assert!(blog.stage_outputs.is_empty());
        assert_eq!(blog.retry_count, 0);
    }

    #[test]
    fn test_stage_output_marks_completion() {
        let mut blog = Blog::new(1, None);
        blog.apply(
            BlogPatch::new()
                .stage_output(Stage::TopicGeneration, "[]")
                .status(PipelineStatus::ContentPlanning),
        )
        .unwrap();

        assert!(blog.step_completion.is_complete(Stage::TopicGeneration));
        assert_eq!(blog.output(Stage::TopicGeneration), Some("[]"));
        assert_eq!(blog.status, PipelineStatus::ContentPlanning);
    }

    #[test]
    fn test_empty_artifact_rejected_without_change() {
        let mut blog = Blog::new(1, None);
        let err = blog
            .apply(
                BlogPatch::new()
                    .stage_output(Stage::TopicGeneration, "   ")
                    .status(PipelineStatus::ContentPlanning),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyArtifact(Stage::TopicGeneration)));
        assert_eq!(blog.status, PipelineStatus::Pending);
        assert!(!blog.step_completion.is_complete(Stage::TopicGeneration));
    }

    #[test]
    fn test_out_of_order_patch_is_atomic() {
        let mut blog = Blog::new(1, None);
        let err = blog
            .apply(
                BlogPatch::new()
                    .stage_output(Stage::Drafting, "draft")
                    .title("should not land"),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::StageOrder { .. }));
        assert!(blog.title.is_none());
        assert!(blog.stage_outputs.is_empty());
    }

    #[test]
    fn test_completed_requires_all_stages() {
        let mut blog = Blog::new(1, None);
        let err = blog
            .apply(BlogPatch::new().status(PipelineStatus::Completed))
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageOrder { .. }));
    }

    #[test]
    fn test_error_set_and_clear() {
        let mut blog = Blog::new(1, None);
        blog.apply(BlogPatch::new().error("provider timeout")).unwrap();
        assert_eq!(blog.error_message.as_deref(), Some("provider timeout"));

        blog.apply(BlogPatch::new().clear_error()).unwrap();
        assert!(blog.error_message.is_none());
    }

    #[test]
    fn test_apply_refreshes_last_activity() {
        let mut blog = Blog::new(1, None);
        let before = blog.last_activity;
        std::thread::sleep(std::time::Duration::from_millis(5));
        blog.apply(BlogPatch::new().paused(true)).unwrap();
        assert!(blog.last_activity > before);
    }

    #[test]
    fn test_replace_output_keeps_completion() {
        let mut blog = Blog::new(1, None);
        let err = blog
            .apply(BlogPatch::new().replace_output(Stage::TopicGeneration, "[]"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotCompleted(1)));
        assert!(blog.stage_outputs.is_empty());

        blog.apply(BlogPatch::new().stage_output(Stage::TopicGeneration, "[]"))
            .unwrap();
        let err = blog
            .apply(BlogPatch::new().replace_output(Stage::TopicGeneration, "\n"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyArtifact(Stage::TopicGeneration)));

        blog.apply(BlogPatch::new().replace_output(Stage::TopicGeneration, "[{}]"))
            .unwrap();
        assert_eq!(blog.output(Stage::TopicGeneration), Some("[{}]"));
        assert_eq!(blog.step_completion.next_stage(), Some(Stage::ContentPlanning));
    }
}
