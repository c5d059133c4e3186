//! # Pipeline Configuration
//!
//! Persisted at `.inkflow/config.json`. Every field is optional on disk;
//! missing fields take their defaults.

use crate::models::{LlmProvider, ModelConfig};
use crate::pipeline::Stage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = ".inkflow/config.json";

/// Searches run before topic generation
const DEFAULT_RESEARCH_QUERIES: [&str; 9] = [
    "GitHub AI trends",
    "OpenAI latest research",
    "Google DeepMind projects",
    "Hugging Face new releases",
    "Microsoft AI announcements",
    "Meta AI trends",
    "Hacker News top posts AI",
    "arXiv trending AI papers",
    "TechCrunch AI startups",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Provider for every stage unless overridden
    pub global_provider: LlmProvider,
    /// Model for every stage; falls back to the provider default
    pub global_model: Option<String>,
    /// OpenAI-compatible endpoint override
    pub base_url: Option<String>,
    pub per_stage_providers: BTreeMap<Stage, LlmProvider>,
    pub per_stage_models: BTreeMap<Stage, String>,
    /// SearXNG instance tried before the public ones
    pub searxng_url: Option<String>,
    pub research_queries: Vec<String>,
    pub results_per_query: u32,
    /// Start the remaining stages right after a topic is picked
    pub auto_resume_on_select: bool,
    pub db_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            global_provider: LlmProvider::default(),
            global_model: None,
            base_url: None,
            per_stage_providers: BTreeMap::new(),
            per_stage_models: BTreeMap::new(),
            searxng_url: None,
            research_queries: DEFAULT_RESEARCH_QUERIES.iter().map(|q| q.to_string()).collect(),
            results_per_query: 3,
            auto_resume_on_select: true,
            db_path: PathBuf::from(crate::state::db::DEFAULT_DB_PATH),
        }
    }
}

impl PipelineConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Apply the fields set in `patch`
    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(provider) = patch.global_provider {
            self.global_provider = provider;
        }
        if patch.global_model.is_some() {
            self.global_model = patch.global_model;
        }
        if patch.base_url.is_some() {
            self.base_url = patch.base_url;
        }
        if patch.searxng_url.is_some() {
            self.searxng_url = patch.searxng_url;
        }
        if let Some(queries) = patch.research_queries {
            self.research_queries = queries;
        }
        if let Some(n) = patch.results_per_query {
            self.results_per_query = n;
        }
        if let Some(auto) = patch.auto_resume_on_select {
            self.auto_resume_on_select = auto;
        }
        self.per_stage_providers.extend(patch.per_stage_providers);
        self.per_stage_models.extend(patch.per_stage_models);
    }

    /// Resolve provider, model and base URL for one stage.
    ///
    /// Precedence: per-stage override, global setting, provider default.
    pub fn model_config_for(&self, stage: Stage) -> ModelConfig {
        let provider = self
            .per_stage_providers
            .get(&stage)
            .copied()
            .unwrap_or(self.global_provider);

        let model = match self.per_stage_models.get(&stage) {
            Some(model) => model.clone(),
            // A global model only makes sense for the global provider
            None if provider == self.global_provider => self
                .global_model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            None => provider.default_model().to_string(),
        };

        let config = ModelConfig::with_provider(provider, model);
        match &self.base_url {
            Some(url) => config.with_base_url(url),
            None => config,
        }
    }
}

/// Partial update accepted by `PATCH /config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<LlmProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searxng_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_queries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_per_query: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_resume_on_select: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub per_stage_providers: BTreeMap<Stage, LlmProvider>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub per_stage_models: BTreeMap<Stage, String>,
}
