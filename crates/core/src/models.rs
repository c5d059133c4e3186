//! # Models
//!
//! LLM provider and model selection for the stage agents. API keys are read
//! from the environment by radkit's `from_env` constructors.

use serde::{Deserialize, Serialize};

/// Supported LLM providers and the env var each one reads its key from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::OpenAI,
            LlmProvider::Anthropic,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Grok => "grok",
            LlmProvider::DeepSeek => "deepseek",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s.trim()))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Model used when nothing is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::OpenRouter => "openai/gpt-4o-mini",
            LlmProvider::Grok => "grok-3-mini",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Only OpenAI-compatible endpoints accept a custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    pub fn has_api_key(&self) -> bool {
        std::env::var(self.api_key_env()).is_ok_and(|v| !v.trim().is_empty())
    }
}

/// Which provider and model one agent call uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    /// OpenAI-compatible endpoint override
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::default())
    }
}

impl ModelConfig {
    /// Provider with its default model
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self::with_provider(provider, provider.default_model())
    }

    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Ignored for providers without base URL support
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if self.provider.supports_base_url() {
            self.base_url = Some(url.into());
        }
        self
    }
}
