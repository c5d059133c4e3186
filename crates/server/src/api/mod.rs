//! # HTTP API
//!
//! ```text
//! /api/v1/blogs/...    pipeline operations and the SSE event stream
//! /api/v1/config       persisted settings
//! /api/v1/providers    LLM provider discovery
//! /api/v1/openapi.json generated API description
//! ```

pub mod blogs;
pub mod config;
pub mod error;

use axum::routing::get;
use axum::{Json, Router};
use inkflow_core::agents::SharedConfig;
use inkflow_core::pipeline::BlogPipeline;
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::OpenApi;

pub struct AppState {
    pub pipeline: BlogPipeline,
    pub config: SharedConfig,
    /// Where `PATCH /config` writes to
    pub config_path: PathBuf,
}

pub type SharedState = Arc<AppState>;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inkflow API",
        version = "1.0.0",
        description = "Resumable blog content pipeline"
    ),
    paths(
        blogs::create_blog,
        blogs::list_blogs,
        blogs::get_blog,
        blogs::delete_blog,
        blogs::generate_topics,
        blogs::list_topics,
        blogs::select_topic,
        blogs::resume_blog,
        blogs::pause_blog,
        blogs::get_resume_status,
        blogs::get_process_status,
        blogs::get_progress,
        blogs::update_content,
        blogs::cleanup_blogs,
        config::get_config,
        config::update_config,
        config::get_providers
    ),
    components(schemas(
        error::ApiResponse,
        blogs::CreateBlogRequest,
        blogs::SelectTopicRequest,
        blogs::UpdateContentRequest,
        config::UpdateConfigRequest,
        config::ProviderInfo,
        config::ProvidersResponse
    )),
    tags(
        (name = "blogs", description = "Blog pipeline operations"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1/blogs", blogs::routes())
        .merge(config::routes())
        .route("/api/v1/openapi.json", get(openapi_json))
        .with_state(state)
}
