//! # Blog API
//!
//! Pipeline operations for one blog plus the shared event stream.

use super::error::{ApiError, ApiResponse, ApiResult};
use super::SharedState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use inkflow_core::pipeline::{
    CleanupReport, ProcessStatus, Progress, ResumeStatus, TopicIdea, TopicList, TopicSelection,
};
use inkflow_core::state::{Blog, BlogId};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateBlogRequest {
    /// Working title; replaced by the selected topic's title
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectTopicRequest {
    /// 1-based position in the generated topic list
    pub topic_selection: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateContentRequest {
    /// Replacement for the finished post
    pub content: String,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/cleanup", post(cleanup_blogs))
        .route("/events", get(events))
        .route("/:id", get(get_blog).delete(delete_blog))
        .route("/:id/topics", get(list_topics).post(generate_topics))
        .route("/:id/select-topic", post(select_topic))
        .route("/:id/resume", post(resume_blog))
        .route("/:id/pause", post(pause_blog))
        .route("/:id/resume-status", get(get_resume_status))
        .route("/:id/process-status", get(get_process_status))
        .route("/:id/progress", get(get_progress))
        .route("/:id/content", put(update_content))
}

/// Create a blog at the start of the pipeline
#[utoipa::path(
    post,
    path = "/api/v1/blogs",
    tag = "blogs",
    request_body = CreateBlogRequest,
    responses((status = 201, description = "Blog created"))
)]
pub async fn create_blog(
    State(state): State<SharedState>,
    body: Option<Json<CreateBlogRequest>>,
) -> Result<(StatusCode, Json<Blog>), ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let blog = state.pipeline.create(req.title)?;
    Ok((StatusCode::CREATED, Json(blog)))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs",
    tag = "blogs",
    responses((status = 200, description = "All blogs in creation order"))
)]
pub async fn list_blogs(State(state): State<SharedState>) -> ApiResult<Vec<Blog>> {
    Ok(Json(state.pipeline.list()?))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs/{id}",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses(
        (status = 200, description = "The blog with every stage artifact"),
        (status = 404, description = "Unknown blog", body = ApiResponse)
    )
)]
pub async fn get_blog(State(state): State<SharedState>, Path(id): Path<BlogId>) -> ApiResult<Blog> {
    Ok(Json(state.pipeline.get(id)?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/blogs/{id}",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "A run is active", body = ApiResponse)
    )
)]
pub async fn delete_blog(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> Result<StatusCode, ApiError> {
    state.pipeline.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run topic generation. Blocks until the stage function returns.
#[utoipa::path(
    post,
    path = "/api/v1/blogs/{id}/topics",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses(
        (status = 200, description = "Generated topic list"),
        (status = 409, description = "Topic already locked in", body = ApiResponse)
    )
)]
pub async fn generate_topics(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> ApiResult<TopicList> {
    Ok(Json(state.pipeline.generate_topics(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs/{id}/topics",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses((status = 200, description = "Stored topic list"))
)]
pub async fn list_topics(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> ApiResult<Vec<TopicIdea>> {
    Ok(Json(state.pipeline.topics(id)?))
}

#[utoipa::path(
    post,
    path = "/api/v1/blogs/{id}/select-topic",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    request_body = SelectTopicRequest,
    responses(
        (status = 200, description = "Topic recorded"),
        (status = 400, description = "No such topic", body = ApiResponse)
    )
)]
pub async fn select_topic(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
    Json(req): Json<SelectTopicRequest>,
) -> ApiResult<TopicSelection> {
    Ok(Json(state.pipeline.select_topic(id, req.topic_selection)?))
}

/// Start the remaining stages in the background
#[utoipa::path(
    post,
    path = "/api/v1/blogs/{id}/resume",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses(
        (status = 202, description = "Run started"),
        (status = 400, description = "Not resumable", body = ApiResponse)
    )
)]
pub async fn resume_blog(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> Result<(StatusCode, Json<Blog>), ApiError> {
    let blog = state.pipeline.resume(id)?;
    Ok((StatusCode::ACCEPTED, Json(blog)))
}

/// Replace the final content of a completed blog
#[utoipa::path(
    put,
    path = "/api/v1/blogs/{id}/content",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    request_body = UpdateContentRequest,
    responses(
        (status = 200, description = "Content replaced"),
        (status = 400, description = "Blog not completed or content empty", body = ApiResponse),
        (status = 409, description = "Blog is busy", body = ApiResponse)
    )
)]
pub async fn update_content(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
    Json(req): Json<UpdateContentRequest>,
) -> ApiResult<Blog> {
    Ok(Json(state.pipeline.update_content(id, req.content)?))
}

/// Ask the active run to stop at the next stage boundary
#[utoipa::path(
    post,
    path = "/api/v1/blogs/{id}/pause",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses(
        (status = 200, description = "Pause requested"),
        (status = 400, description = "No active run", body = ApiResponse)
    )
)]
pub async fn pause_blog(State(state): State<SharedState>, Path(id): Path<BlogId>) -> ApiResult<Blog> {
    Ok(Json(state.pipeline.pause(id)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs/{id}/resume-status",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses((status = 200, description = "Whether the blog can be resumed"))
)]
pub async fn get_resume_status(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> ApiResult<ResumeStatus> {
    Ok(Json(state.pipeline.resume_status(id)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs/{id}/process-status",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses((status = 200, description = "Full run state"))
)]
pub async fn get_process_status(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> ApiResult<ProcessStatus> {
    Ok(Json(state.pipeline.process_status(id)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/blogs/{id}/progress",
    tag = "blogs",
    params(("id" = i64, Path, description = "Blog id")),
    responses((status = 200, description = "Status and completion percentage"))
)]
pub async fn get_progress(
    State(state): State<SharedState>,
    Path(id): Path<BlogId>,
) -> ApiResult<Progress> {
    Ok(Json(state.pipeline.progress(id)?))
}

/// Delete blogs that never produced topics
#[utoipa::path(
    post,
    path = "/api/v1/blogs/cleanup",
    tag = "blogs",
    responses((status = 200, description = "Deleted ids and kept count"))
)]
pub async fn cleanup_blogs(State(state): State<SharedState>) -> ApiResult<CleanupReport> {
    Ok(Json(state.pipeline.cleanup_abandoned()?))
}

/// SSE stream of pipeline events with a heartbeat comment every 15 seconds
async fn events(State(state): State<SharedState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.pipeline.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match tokio::time::timeout(HEARTBEAT_INTERVAL, rx.recv()).await {
                Ok(Ok(event)) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    return Some((Ok(Event::default().event("pipeline").data(json)), rx));
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                    continue;
                }
                Ok(Err(RecvError::Closed)) => return None,
                Err(_) => return Some((Ok(Event::default().comment("heartbeat")), rx)),
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
