//! # SEO Agent
//!
//! Final pass: SEO title and meta description, optimized headings, FAQs and a
//! references section. The artifact is the publishable markdown.

use crate::models::ModelConfig;
use crate::run_llm_function;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct SeoPackage {
    pub seo_title: String,
    /// One short paragraph, no headings
    pub meta_description: String,
    pub keywords: Vec<String>,
    /// Post body with optimized H2/H3 headings, without title or FAQs
    pub body_markdown: String,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    /// `Title (Year) -- URL`, real URLs only
    #[serde(default)]
    pub references: Vec<String>,
}

impl SeoPackage {
    pub fn to_markdown(&self) -> String {
        let mut md = format!(
            "# {}\n\n{}\n\n{}\n",
            self.seo_title.trim(),
            self.meta_description.trim(),
            self.body_markdown.trim()
        );

        if !self.faqs.is_empty() {
            md.push_str("\n## FAQ's\n");
            for faq in &self.faqs {
                let question = faq.question.trim().trim_end_matches('?');
                md.push_str(&format!("\n### {}?\n{}\n", question, faq.answer.trim()));
            }
        }

        let references: Vec<&String> = self
            .references
            .iter()
            .filter(|r| has_real_url(r))
            .collect();
        if !references.is_empty() {
            md.push_str("\n## References\n\n");
            for reference in references {
                md.push_str(&format!("{}\n", reference.trim()));
            }
        }

        if !self.keywords.is_empty() {
            md.push_str(&format!("\n<!-- keywords: {} -->\n", self.keywords.join(", ")));
        }
        md
    }
}

/// Placeholder references ("URL needed", "TBD") are dropped
fn has_real_url(reference: &str) -> bool {
    reference.contains("http://") || reference.contains("https://")
}

pub struct SeoAgent;

impl SeoAgent {
    pub async fn run(post: &str, config: &ModelConfig) -> anyhow::Result<SeoPackage> {
        let prompt = format!("<blog_post>\n{}\n</blog_post>", post);
        run_llm_function!(config, SeoPackage, SYSTEM_PROMPT, prompt)
    }
}

const SYSTEM_PROMPT: &str = include_str!("defaults/seo.md");
