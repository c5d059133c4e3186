//! # Topic Lists
//!
//! The `topic_generation` artifact is a list of candidate topics. Agents emit
//! JSON; hand-written or legacy artifacts in numbered-markdown form are also
//! accepted.

use crate::state::SelectedTopic;
use serde::{Deserialize, Serialize};

/// One candidate topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicIdea {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub audience: String,
}

impl TopicIdea {
    /// Planner-facing description of the topic
    pub fn details(&self) -> String {
        let mut lines = Vec::new();
        if !self.summary.is_empty() {
            lines.push(self.summary.clone());
        }
        if !self.angle.is_empty() {
            lines.push(format!("Angle: {}", self.angle));
        }
        if !self.audience.is_empty() {
            lines.push(format!("Audience: {}", self.audience));
        }
        lines.join("\n")
    }
}

/// Parse a topic artifact, JSON first, numbered markdown second
pub fn parse_topics(raw: &str) -> Vec<TopicIdea> {
    if let Ok(topics) = serde_json::from_str::<Vec<TopicIdea>>(raw) {
        return topics;
    }
    parse_markdown_topics(raw)
}

/// Pick topic `number` (1-based)
pub fn select_topic(topics: &[TopicIdea], number: usize) -> Option<SelectedTopic> {
    let topic = number.checked_sub(1).and_then(|i| topics.get(i))?;
    Some(SelectedTopic {
        number,
        title: topic.title.trim().to_string(),
        category: topic.category.clone(),
        details: topic.details().trim().to_string(),
    })
}

/// Numbered list grouped under `**[Category]**` headers. Lines that follow a
/// numbered title are folded into its summary.
fn parse_markdown_topics(raw: &str) -> Vec<TopicIdea> {
    let mut topics: Vec<TopicIdea> = Vec::new();
    let mut category = String::new();
    let mut details: Vec<String> = Vec::new();

    let flush = |topics: &mut Vec<TopicIdea>, details: &mut Vec<String>| {
        if let Some(last) = topics.last_mut() {
            last.summary = details.join("\n");
        }
        details.clear();
    };

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("**[") && line.ends_with("]**") {
            category = line.trim_matches(|c| c == '*' || c == '[' || c == ']').to_string();
            continue;
        }

        if let Some(title) = numbered_title(line) {
            flush(&mut topics, &mut details);
            topics.push(TopicIdea {
                title,
                category: category.clone(),
                summary: String::new(),
                angle: String::new(),
                audience: String::new(),
            });
        } else if !topics.is_empty() {
            details.push(line.to_string());
        }
    }
    flush(&mut topics, &mut details);

    topics
}

/// `"3. **Title:** Foo"` -> `Some("Foo")`
fn numbered_title(line: &str) -> Option<String> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?.trim();

    let mut title = rest;
    for prefix in ["**Title:**", "**Title**:", "**Title:", "Title:"] {
        if let Some(stripped) = title.strip_prefix(prefix) {
            title = stripped.trim();
            break;
        }
    }
    let title = title
        .trim_matches('*')
        .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim();

    Some(title.to_string())
}
