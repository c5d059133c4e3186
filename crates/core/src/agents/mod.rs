//! # Stage Agents
//!
//! LLM-backed stage functions, one per pipeline stage:
//!
//! ```text
//! topic_generation  -> TopicAgent   (web research + topic list)
//! content_planning  -> PlannerAgent (selected topic -> plan)
//! drafting          -> WriterAgent  (plan -> draft)
//! editing           -> EditorAgent  (draft -> edited post)
//! seo_optimization  -> SeoAgent     (edited post -> final markdown)
//! ```
//!
//! [`LlmStageRunner`] plugs them into the pipeline as a [`StageRunner`].

pub mod editor_agent;
pub mod llm_helpers;
pub mod planner_agent;
pub mod research;
pub mod seo_agent;
pub mod topic_agent;
pub mod writer_agent;

pub use editor_agent::EditorAgent;
pub use planner_agent::PlannerAgent;
pub use research::WebResearch;
pub use seo_agent::SeoAgent;
pub use topic_agent::TopicAgent;
pub use writer_agent::WriterAgent;

use crate::config::PipelineConfig;
use crate::pipeline::{Stage, StageInput, StageRunner};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Config shared with the HTTP layer; edits apply to the next stage call
pub type SharedConfig = Arc<RwLock<PipelineConfig>>;

/// Dispatches each stage to its agent with the stage's model config
pub struct LlmStageRunner {
    config: SharedConfig,
}

impl LlmStageRunner {
    pub fn new(config: PipelineConfig) -> Self {
        Self::shared(Arc::new(RwLock::new(config)))
    }

    pub fn shared(config: SharedConfig) -> Self {
        Self { config }
    }

    fn snapshot(&self) -> anyhow::Result<PipelineConfig> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    fn required<'a>(input: &'a StageInput, stage: Stage) -> anyhow::Result<&'a str> {
        input
            .previous_artifact(stage)
            .with_context(|| format!("{} needs the previous stage's artifact", stage))
    }
}

#[async_trait]
impl StageRunner for LlmStageRunner {
    async fn run(&self, stage: Stage, input: &StageInput) -> anyhow::Result<String> {
        let config = self.snapshot()?;
        let model = config.model_config_for(stage);
        tracing::debug!(blog_id = input.blog_id, %stage, provider = model.provider.id(), model = %model.model, "calling stage agent");

        match stage {
            Stage::TopicGeneration => {
                let research = WebResearch::new(config.searxng_url.as_deref())?;
                let digest = research
                    .gather(&config.research_queries, config.results_per_query as usize)
                    .await;
                TopicAgent::run(&digest, &model).await?.into_artifact()
            }
            Stage::ContentPlanning => {
                let topic = input
                    .selected_topic
                    .as_ref()
                    .context("content planning needs a selected topic")?;
                Ok(PlannerAgent::run(topic, &model).await?.to_markdown())
            }
            Stage::Drafting => {
                let plan = Self::required(input, stage)?;
                let title = input
                    .selected_topic
                    .as_ref()
                    .map(|t| t.title.as_str())
                    .or(input.title.as_deref())
                    .unwrap_or_default();
                Ok(WriterAgent::run(title, plan, &model).await?.to_markdown())
            }
            Stage::Editing => {
                let draft = Self::required(input, stage)?;
                Ok(EditorAgent::run(draft, &model).await?.body_markdown)
            }
            Stage::SeoOptimization => {
                let edited = Self::required(input, stage)?;
                Ok(SeoAgent::run(edited, &model).await?.to_markdown())
            }
        }
    }
}
