//! # Pipeline Events
//!
//! Progress notifications pushed to observers (the SSE endpoint) so clients
//! don't have to poll process status.

use super::stage::{PipelineStatus, Stage};
use crate::state::BlogId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Kind of pipeline event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// A run was registered for the blog
    RunStarted,
    /// A stage function was invoked
    StageStarted,
    /// A stage artifact was persisted
    StageCompleted,
    /// A stage function failed
    StageFailed,
    /// A human picked a topic
    TopicSelected,
    /// Pause requested; takes effect at the next stage boundary
    PauseRequested,
    /// The loop halted on a pause request
    RunPaused,
    /// Every stage is complete
    RunCompleted,
    /// The loop stopped on a failure
    RunFailed,
}

/// An event for one blog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub blog_id: BlogId,
    pub kind: PipelineEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PipelineStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stage wall time, on completion events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl PipelineEvent {
    pub fn new(blog_id: BlogId, kind: PipelineEventKind) -> Self {
        Self {
            blog_id,
            kind,
            timestamp: Utc::now(),
            stage: None,
            status: None,
            message: None,
            duration_ms: None,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_status(mut self, status: PipelineStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Fan-out handle shared by the executor and coordinator.
///
/// Sending with no subscribers is fine; events are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: PipelineEvent) {
        tracing::debug!(blog_id = event.blog_id, kind = ?event.kind, "pipeline event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
