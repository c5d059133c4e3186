//! # LLM Helpers
//!
//! Provider dispatch for the stage agents. radkit's provider clients are
//! distinct types, so the match over [`LlmProvider`](crate::models::LlmProvider)
//! is expanded once per call site by these macros.

/// Bind `$llm` to the configured provider client and evaluate `$body`.
///
/// Must be used inside a function returning `anyhow::Result`.
#[macro_export]
macro_rules! with_provider_llm {
    ($config:expr, $llm:ident => $body:expr) => {{
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let config = $config;
        match config.provider {
            LlmProvider::OpenAI => {
                let $llm = match &config.base_url {
                    Some(base_url) => OpenAILlm::from_env(&config.model)?.with_base_url(base_url),
                    None => OpenAILlm::from_env(&config.model)?,
                };
                $body
            }
            LlmProvider::Anthropic => {
                let $llm = AnthropicLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::Gemini => {
                let $llm = GeminiLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::OpenRouter => {
                let $llm = OpenRouterLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::Grok => {
                let $llm = GrokLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::DeepSeek => {
                let $llm = DeepSeekLlm::from_env(&config.model)?;
                $body
            }
        }
    }};
}

/// Run a structured `LlmFunction` returning `$output_type`
#[macro_export]
macro_rules! run_llm_function {
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        let input = $input;
        let result: anyhow::Result<$output_type> = $crate::with_provider_llm!($config, llm => {
            radkit::agent::LlmFunction::<$output_type>::new_with_system_instructions(
                llm,
                $system_prompt,
            )
            .run(input)
            .await
            .map_err(Into::into)
        });
        result
    }};
}

pub use run_llm_function;
pub use with_provider_llm;
