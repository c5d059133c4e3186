//! # API Errors
//!
//! Maps pipeline errors to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use inkflow_core::PipelineError;
use serde::Serialize;
use utoipa::ToSchema;

/// Body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::AlreadyActive(_) | PipelineError::TopicLocked(_) => StatusCode::CONFLICT,
            PipelineError::NotResumable { .. }
            | PipelineError::NotActive(_)
            | PipelineError::InvalidTopicSelection { .. }
            | PipelineError::StageOrder { .. }
            | PipelineError::EmptyArtifact(_)
            | PipelineError::NotCompleted(_)
            | PipelineError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ApiResponse {
            success: false,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
