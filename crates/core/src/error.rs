//! # Pipeline Errors
//!
//! Error taxonomy surfaced to callers of the pipeline. Stage failures are not
//! in here: they are caught by the executor and persisted as a `failed` unit.

use crate::pipeline::Stage;
use crate::state::BlogId;
use thiserror::Error;

/// Errors returned by pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unknown work unit id
    #[error("blog {0} not found")]
    NotFound(BlogId),

    /// A run is already registered for this unit
    #[error("a pipeline run is already active for blog {0}")]
    AlreadyActive(BlogId),

    /// Resume was refused; `reason` is the same string `resume_status` reports
    #[error("blog {id} cannot be resumed: {reason}")]
    NotResumable { id: BlogId, reason: String },

    /// Pause was requested but nothing is running
    #[error("no active pipeline run for blog {0}")]
    NotActive(BlogId),

    /// A stage would complete ahead of an earlier incomplete one
    #[error("stage {stage} cannot complete before {missing}")]
    StageOrder { stage: Stage, missing: Stage },

    /// A stage tried to persist an empty artifact
    #[error("stage {0} produced an empty artifact")]
    EmptyArtifact(Stage),

    /// Topic selection out of range or no topics generated
    #[error("invalid topic selection for blog {id}: {reason}")]
    InvalidTopicSelection { id: BlogId, reason: String },

    /// The topic can no longer change because planning has started
    #[error("topic for blog {0} is locked; content planning already completed")]
    TopicLocked(BlogId),

    /// Final content can only be replaced once every stage has completed
    #[error("blog {0} has not completed; final content cannot be replaced yet")]
    NotCompleted(BlogId),

    /// A configuration update named an unknown stage or provider
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persistence backend failure
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.into())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_resumable_message_carries_reason() {
        let err = PipelineError::NotResumable {
            id: 7,
            reason: "already completed".to_string(),
        };
        assert_eq!(err.to_string(), "blog 7 cannot be resumed: already completed");
    }

    #[test]
    fn test_stage_order_message() {
        let err = PipelineError::StageOrder {
            stage: Stage::Editing,
            missing: Stage::Drafting,
        };
        assert_eq!(
            err.to_string(),
            "stage editing cannot complete before drafting"
        );
    }
}
