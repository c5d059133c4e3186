//! # Editor Agent

use crate::models::ModelConfig;
use crate::run_llm_function;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct EditedPost {
    /// The full edited post in markdown
    pub body_markdown: String,
    /// Summary of the key edits made
    #[serde(default)]
    pub edits: Vec<String>,
}

pub struct EditorAgent;

impl EditorAgent {
    pub async fn run(draft: &str, config: &ModelConfig) -> anyhow::Result<EditedPost> {
        let prompt = format!("<blog_post>\n{}\n</blog_post>", draft);
        let edited = run_llm_function!(config, EditedPost, SYSTEM_PROMPT, prompt)?;
        tracing::debug!(edits = edited.edits.len(), "editor pass finished");
        Ok(edited)
    }
}

const SYSTEM_PROMPT: &str = include_str!("defaults/editor.md");
