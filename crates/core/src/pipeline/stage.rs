//! # Pipeline Stages
//!
//! The fixed, ordered stage list and the sequencer that picks the next stage
//! from a unit's completion map.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stage of the content pipeline, declared in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Research and propose candidate topics
    TopicGeneration,
    /// Outline the post for the selected topic
    ContentPlanning,
    /// Write the first draft from the plan
    Drafting,
    /// Polish the draft
    Editing,
    /// Final SEO pass
    SeoOptimization,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 5] = [
        Stage::TopicGeneration,
        Stage::ContentPlanning,
        Stage::Drafting,
        Stage::Editing,
        Stage::SeoOptimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopicGeneration => "topic_generation",
            Self::ContentPlanning => "content_planning",
            Self::Drafting => "drafting",
            Self::Editing => "editing",
            Self::SeoOptimization => "seo_optimization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topic_generation" => Some(Self::TopicGeneration),
            "content_planning" => Some(Self::ContentPlanning),
            "drafting" => Some(Self::Drafting),
            "editing" => Some(Self::Editing),
            "seo_optimization" => Some(Self::SeoOptimization),
            _ => None,
        }
    }

    /// Position in the fixed order
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The stage that follows this one, `None` after the last
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The stage that precedes this one, `None` for the first
    pub fn previous(&self) -> Option<Stage> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Every stage after topic generation builds on a human-selected topic
    pub fn requires_selected_topic(&self) -> bool {
        !matches!(self, Self::TopicGeneration)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted status of a work unit.
///
/// Stage variants mean "this stage is next or in flight".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Created, topic generation not started
    #[default]
    Pending,
    TopicGeneration,
    ContentPlanning,
    Drafting,
    Editing,
    SeoOptimization,
    /// All stages done
    Completed,
    /// Last stage attempt failed; resumable
    Failed,
    /// Halted on request at a stage boundary; resumable
    Paused,
}

impl PipelineStatus {
    pub fn from_stage(stage: Stage) -> Self {
        match stage {
            Stage::TopicGeneration => Self::TopicGeneration,
            Stage::ContentPlanning => Self::ContentPlanning,
            Stage::Drafting => Self::Drafting,
            Stage::Editing => Self::Editing,
            Stage::SeoOptimization => Self::SeoOptimization,
        }
    }

    /// Status after `stage` succeeded
    pub fn after(stage: Stage) -> Self {
        stage.next().map(Self::from_stage).unwrap_or(Self::Completed)
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::TopicGeneration => Some(Stage::TopicGeneration),
            Self::ContentPlanning => Some(Stage::ContentPlanning),
            Self::Drafting => Some(Stage::Drafting),
            Self::Editing => Some(Stage::Editing),
            Self::SeoOptimization => Some(Stage::SeoOptimization),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
            other => other.stage().map(|s| s.as_str()).unwrap_or("pending"),
        }
    }

    /// User-facing progress message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Pending => "Blog created. Generate topics to continue.",
            Self::TopicGeneration => "Generating trending topics...",
            Self::ContentPlanning => "Creating detailed content plan...",
            Self::Drafting => "Writing blog content...",
            Self::Editing => "Editing and refining content...",
            Self::SeoOptimization => "Optimizing for SEO...",
            Self::Completed => "Blog creation completed!",
            Self::Failed => "Blog creation failed",
            Self::Paused => "Pipeline was paused",
        }
    }
}

/// A status string that names no [`PipelineStatus`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for PipelineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "paused" => Ok(Self::Paused),
            other => Stage::parse(other)
                .map(Self::from_stage)
                .ok_or_else(|| UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record of which stages have finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepCompletion(BTreeMap<Stage, bool>);

impl StepCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self, stage: Stage) -> bool {
        self.0.get(&stage).copied().unwrap_or(false)
    }

    /// First stage in the fixed order that is not complete.
    ///
    /// A gap (later stage true, earlier false) returns the earliest incomplete
    /// stage; the sequencer never skips ahead.
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| !self.is_complete(*s))
    }

    pub fn all_complete(&self) -> bool {
        self.next_stage().is_none()
    }

    /// Number of stages completed, counting the whole map
    pub fn completed_count(&self) -> usize {
        Stage::ALL.iter().filter(|s| self.is_complete(**s)).count()
    }

    pub fn progress_percentage(&self) -> u8 {
        let done = self.completed_count() as f64;
        ((done / Stage::ALL.len() as f64) * 100.0).round() as u8
    }

    /// Mark `stage` complete. Refused if an earlier stage is still open.
    pub fn mark_complete(&mut self, stage: Stage) -> PipelineResult<()> {
        if let Some(missing) = Stage::ALL[..stage.index()]
            .iter()
            .copied()
            .find(|s| !self.is_complete(*s))
        {
            return Err(PipelineError::StageOrder { stage, missing });
        }
        self.0.insert(stage, true);
        Ok(())
    }

    /// Full view with every stage present, for status reporting
    pub fn snapshot(&self) -> BTreeMap<Stage, bool> {
        Stage::ALL
            .into_iter()
            .map(|s| (s, self.is_complete(s)))
            .collect()
    }

    /// Completed stages form a prefix of the fixed order
    pub fn is_prefix(&self) -> bool {
        let done = self.completed_count();
        Stage::ALL[..done].iter().all(|s| self.is_complete(*s))
    }
}

impl From<BTreeMap<Stage, bool>> for StepCompletion {
    fn from(map: BTreeMap<Stage, bool>) -> Self {
        Self(map)
    }
}
