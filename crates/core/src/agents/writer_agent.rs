//! # Writer Agent
//!
//! First draft from the content plan.

use crate::models::ModelConfig;
use crate::run_llm_function;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct BlogDraft {
    pub title: String,
    /// Full post body in markdown, starting below the title
    pub body_markdown: String,
}

impl BlogDraft {
    pub fn to_markdown(&self) -> String {
        let body = self.body_markdown.trim();
        // Models sometimes repeat the title as the first heading
        if body.starts_with("# ") {
            return format!("{}\n", body);
        }
        format!("# {}\n\n{}\n", self.title.trim(), body)
    }
}

pub struct WriterAgent;

impl WriterAgent {
    pub async fn run(topic_title: &str, plan: &str, config: &ModelConfig) -> anyhow::Result<BlogDraft> {
        let prompt = format!("Topic: {}\n\n<content_plan>\n{}\n</content_plan>", topic_title, plan);
        run_llm_function!(config, BlogDraft, SYSTEM_PROMPT, prompt)
    }
}

const SYSTEM_PROMPT: &str = include_str!("defaults/writer.md");
