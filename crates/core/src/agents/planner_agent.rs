//! # Planner Agent
//!
//! Builds a section-by-section content plan for the selected topic.

use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::state::SelectedTopic;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct PlanSection {
    pub heading: String,
    /// Technical questions the section answers
    pub points: Vec<String>,
    /// Examples, case studies or benchmarks to cite
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ContentPlan {
    pub title: String,
    pub target_audience: String,
    pub key_takeaways: Vec<String>,
    pub sections: Vec<PlanSection>,
    /// Limitations and risks the post must acknowledge
    #[serde(default)]
    pub risks: Vec<String>,
}

impl ContentPlan {
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# {}\n\n**Target audience:** {}\n\n", self.title, self.target_audience);

        md.push_str("## Key takeaways\n\n");
        for takeaway in &self.key_takeaways {
            md.push_str(&format!("- {}\n", takeaway));
        }

        md.push_str("\n## Structure\n");
        for (i, section) in self.sections.iter().enumerate() {
            md.push_str(&format!("\n### {}. {}\n\n", i + 1, section.heading));
            for point in &section.points {
                md.push_str(&format!("- {}\n", point));
            }
            for evidence in &section.evidence {
                md.push_str(&format!("- Evidence: {}\n", evidence));
            }
        }

        if !self.risks.is_empty() {
            md.push_str("\n## Risks and limitations\n\n");
            for risk in &self.risks {
                md.push_str(&format!("- {}\n", risk));
            }
        }
        md
    }
}

pub struct PlannerAgent;

impl PlannerAgent {
    pub async fn run(topic: &SelectedTopic, config: &ModelConfig) -> anyhow::Result<ContentPlan> {
        let prompt = format!(
            "Topic: {}\nCategory: {}\n\n{}",
            topic.title, topic.category, topic.details
        );
        run_llm_function!(config, ContentPlan, SYSTEM_PROMPT, prompt)
    }
}

const SYSTEM_PROMPT: &str = include_str!("defaults/planner.md");
