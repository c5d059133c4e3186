//! # Config API
//!
//! Read and patch the persisted settings. Patches land on disk and in the
//! shared config the stage runner reads, so the next stage call picks
//! them up without a restart.

use super::error::{ApiError, ApiResponse};
use super::SharedState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use inkflow_core::config::{ConfigPatch, PipelineConfig};
use inkflow_core::models::LlmProvider;
use inkflow_core::pipeline::Stage;
use inkflow_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Body of `PATCH /api/v1/config`. Absent fields keep their current value;
/// stage and provider names are matched case-insensitively.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateConfigRequest {
    #[schema(example = "anthropic")]
    global_provider: Option<String>,
    global_model: Option<String>,
    base_url: Option<String>,
    searxng_url: Option<String>,
    research_queries: Option<Vec<String>>,
    results_per_query: Option<u32>,
    auto_resume_on_select: Option<bool>,
    /// Stage name to provider id
    per_stage_providers: BTreeMap<String, String>,
    /// Stage name to model name
    per_stage_models: BTreeMap<String, String>,
}

fn parse_stage(name: &str) -> Result<Stage, PipelineError> {
    Stage::parse(&name.trim().to_ascii_lowercase()).ok_or_else(|| PipelineError::InvalidConfig(format!("unknown stage `{}`", name)))
}

fn parse_provider(name: &str) -> Result<LlmProvider, PipelineError> {
    LlmProvider::parse(name)
        .ok_or_else(|| PipelineError::InvalidConfig(format!("unknown provider `{}`", name)))
}

impl TryFrom<UpdateConfigRequest> for ConfigPatch {
    type Error = PipelineError;

    fn try_from(req: UpdateConfigRequest) -> Result<Self, Self::Error> {
        let per_stage_providers = req
            .per_stage_providers
            .iter()
            .map(|(stage, provider)| Ok((parse_stage(stage)?, parse_provider(provider)?)))
            .collect::<Result<BTreeMap<_, _>, PipelineError>>()?;
        let per_stage_models = req
            .per_stage_models
            .into_iter()
            .map(|(stage, model)| Ok((parse_stage(&stage)?, model)))
            .collect::<Result<BTreeMap<_, _>, PipelineError>>()?;

        Ok(ConfigPatch {
            global_provider: req.global_provider.as_deref().map(parse_provider).transpose()?,
            global_model: req.global_model,
            base_url: req.base_url,
            searxng_url: req.searxng_url,
            research_queries: req.research_queries,
            results_per_query: req.results_per_query,
            auto_resume_on_select: req.auto_resume_on_select,
            per_stage_providers,
            per_stage_models,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    id: String,
    name: String,
    default_model: String,
    supports_base_url: bool,
    env_var: String,
    /// The API key variable is set in this process
    configured: bool,
}

impl From<LlmProvider> for ProviderInfo {
    fn from(provider: LlmProvider) -> Self {
        Self {
            id: provider.id().to_string(),
            name: provider.display_name().to_string(),
            default_model: provider.default_model().to_string(),
            supports_base_url: provider.supports_base_url(),
            env_var: provider.api_key_env().to_string(),
            configured: provider.has_api_key(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    providers: Vec<ProviderInfo>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
}

fn lock_error(e: impl std::fmt::Display) -> ApiError {
    ApiError(PipelineError::Storage(anyhow::anyhow!("Lock error: {}", e)))
}

/// Current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses((status = 200, description = "Current configuration"))
)]
pub async fn get_config(State(state): State<SharedState>) -> Result<Json<PipelineConfig>, ApiError> {
    let config = state.config.read().map_err(lock_error)?;
    Ok(Json(config.clone()))
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Updated configuration"),
        (status = 400, description = "Unknown stage or provider", body = ApiResponse),
        (status = 500, description = "Config could not be saved", body = ApiResponse)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<PipelineConfig>, ApiError> {
    let patch = ConfigPatch::try_from(req)?;
    let updated = {
        let mut config = state.config.write().map_err(lock_error)?;
        config.merge(patch);
        config.clone()
    };

    updated
        .save(&state.config_path)
        .map_err(|e| ApiError(PipelineError::Storage(e)))?;
    state.pipeline.set_auto_resume(updated.auto_resume_on_select);
    tracing::info!(path = %state.config_path.display(), "config updated");

    Ok(Json(updated))
}

/// Supported LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "List of supported LLM providers", body = ProvidersResponse)
    )
)]
pub async fn get_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: LlmProvider::all().into_iter().map(ProviderInfo::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::router;
    use super::super::test_support::state;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use inkflow_core::config::PipelineConfig;
    use inkflow_core::pipeline::Stage;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_patch_persists_and_applies_live() {
        let (state, _dir) = state(false);
        let app = router(state.clone());

        let request = Request::builder()
            .method("PATCH")
            .uri("/api/v1/config")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "global_model": "gpt-4o",
                    "per_stage_providers": { "editing": "anthropic" },
                    "auto_resume_on_select": false
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["global_model"], "gpt-4o");

        let live = state.config.read().unwrap().clone();
        assert_eq!(live.model_config_for(Stage::Drafting).model, "gpt-4o");
        assert!(!live.auto_resume_on_select);

        let on_disk = PipelineConfig::load(&state.config_path).unwrap();
        assert_eq!(on_disk, live);
    }

    #[tokio::test]
    async fn test_patch_with_unknown_provider_is_rejected() {
        let (state, _dir) = state(false);
        let before = state.config.read().unwrap().clone();

        let request = Request::builder()
            .method("PATCH")
            .uri("/api/v1/config")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "global_model": "gpt-4o",
                    "per_stage_providers": { "drafting": "mistral" }
                })
                .to_string(),
            ))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert!(body["message"].as_str().unwrap().contains("unknown provider `mistral`"));
        assert_eq!(*state.config.read().unwrap(), before);
    }

    #[test]
    fn test_request_converts_names_case_insensitively() {
        let req: super::UpdateConfigRequest = serde_json::from_value(json!({
            "global_provider": "OpenAI",
            "per_stage_models": { "SEO_Optimization": "gpt-4o" }
        }))
        .unwrap();
        let patch = super::ConfigPatch::try_from(req).unwrap();
        assert_eq!(patch.global_provider, Some(super::LlmProvider::OpenAI));
        assert_eq!(patch.per_stage_models[&Stage::SeoOptimization], "gpt-4o");
        assert!(patch.per_stage_providers.is_empty());
    }

    #[tokio::test]
    async fn test_providers_lists_openai_first() {
        let (state, _dir) = state(false);
        let request = Request::builder()
            .uri("/api/v1/providers")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();

        let providers = body["providers"].as_array().unwrap();
        assert_eq!(providers[0]["id"], "openai");
        assert_eq!(providers[0]["default_model"], "gpt-4o-mini");
        assert_eq!(providers[0]["supports_base_url"], true);
    }
}
