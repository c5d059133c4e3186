//! # Topic Agent
//!
//! Turns a web research digest into a categorised list of candidate topics.
//! The artifact is the JSON form of [`TopicIdea`] that topic selection reads.

use crate::models::ModelConfig;
use crate::pipeline::TopicIdea;
use crate::run_llm_function;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One proposed topic
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ProposedTopic {
    pub title: String,
    /// One of: Trending Now, Needs Explanation, Thought Leadership
    pub category: String,
    /// 2-3 sentence summary
    pub summary: String,
    pub angle: String,
    pub audience: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct TopicBatch {
    pub topics: Vec<ProposedTopic>,
}

impl TopicBatch {
    /// Serialize as the `topic_generation` artifact
    pub fn into_artifact(self) -> anyhow::Result<String> {
        if self.topics.is_empty() {
            anyhow::bail!("model returned no topics");
        }
        let ideas: Vec<TopicIdea> = self
            .topics
            .into_iter()
            .map(|t| TopicIdea {
                title: t.title,
                category: t.category,
                summary: t.summary,
                angle: t.angle,
                audience: t.audience,
            })
            .collect();
        Ok(serde_json::to_string_pretty(&ideas)?)
    }
}

pub struct TopicAgent;

impl TopicAgent {
    pub async fn run(research: &str, config: &ModelConfig) -> anyhow::Result<TopicBatch> {
        run_llm_function!(config, TopicBatch, SYSTEM_PROMPT, build_prompt(research))
    }
}

fn build_prompt(research: &str) -> String {
    let research = if research.trim().is_empty() {
        "(no search results; rely on what you know about current trends)"
    } else {
        research
    };
    format!(
        "===== START OF RAW SOURCE MATERIAL =====\n{}\n===== END OF RAW SOURCE MATERIAL =====",
        research
    )
}

const SYSTEM_PROMPT: &str = include_str!("defaults/topics.md");
