//! # Pipeline
//!
//! The content pipeline state machine: stage order, single-stage execution,
//! the per-blog run loop, and resume/pause decisions.

pub mod coordinator;
pub mod events;
pub mod executor;
pub mod registry;
pub mod resume;
pub mod service;
pub mod stage;
pub mod topics;

pub use coordinator::{Coordinator, RunOutcome};
pub use events::{EventBus, PipelineEvent, PipelineEventKind};
pub use executor::{StageInput, StageOutcome, StageRunner, StepExecutor};
pub use registry::{ActiveRuns, RunGuard, RunKind};
pub use resume::{resume_status, ProcessStatus, ResumeEngine, ResumeStatus};
pub use service::{BlogPipeline, CleanupReport, Progress, TopicList, TopicSelection};
pub use stage::{PipelineStatus, Stage, StepCompletion, UnknownStatus};
pub use topics::TopicIdea;
