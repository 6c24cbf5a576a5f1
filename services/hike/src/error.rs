//! Custom error types for the hike service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Custom error type for the hike service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource absent
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Lifecycle outcome surfaced to the client
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, "not_found", format!("{} not found", what))
            }
            ApiError::Lifecycle(err) => match err {
                LifecycleError::NotFound(what) => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("{} not found", what),
                ),
                LifecycleError::AlreadyStarted => (
                    StatusCode::CONFLICT,
                    "already_started",
                    "Hike session already started".to_string(),
                ),
                LifecycleError::NotStarted => (
                    StatusCode::CONFLICT,
                    "not_started",
                    "Hike session has not been started".to_string(),
                ),
                LifecycleError::AlreadyCompleted => (
                    StatusCode::CONFLICT,
                    "already_completed",
                    "Hike session already completed".to_string(),
                ),
                LifecycleError::RecordingFailed(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "recording_failed",
                    "Failed to record hike completion".to_string(),
                ),
                LifecycleError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                ),
            },
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Database error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
