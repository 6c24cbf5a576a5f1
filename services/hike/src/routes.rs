//! Hike service routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        ActingUserRequest, PlanHikeRequest, PlanHikeResponse, SessionDetailResponse,
        StartHikeResponse, StopHikeResponse,
    },
    state::AppState,
};

/// Create the router for the hike service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/hikes", post(plan_hike))
        .route("/hikes/:id", get(get_hike))
        .route("/hikes/:id/start", post(start_hike))
        .route("/hikes/:id/stop", post(stop_hike))
        .route("/hikes/:id/accept", post(accept_invitation))
        .route(
            "/hikes/:id/participants/:user_id",
            delete(decline_invitation),
        )
        .route("/users/:id/completed-hikes", get(completed_hikes))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "hike-service"
    }))
}

/// Plan a new hike session with the creator confirmed and invitees invited
pub async fn plan_hike(
    State(state): State<AppState>,
    Json(payload): Json<PlanHikeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .find_trail(payload.trail_id)
        .await?
        .ok_or(ApiError::NotFound("trail"))?;

    let session_id = state
        .store
        .create_session(
            payload.trail_id,
            payload.scheduled_at,
            payload.creator_id,
            &payload.invited_user_ids,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PlanHikeResponse { session_id })))
}

/// Get a planned session together with its participations
pub async fn get_hike(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .store
        .find_session(id)
        .await?
        .ok_or(ApiError::NotFound("hike session"))?;
    let participations = state.store.participations_for_session(id).await?;

    Ok(Json(SessionDetailResponse {
        session,
        participations,
    }))
}

/// Start a planned session and arm its auto-completion timer
pub async fn start_hike(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActingUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.lifecycle.start(id, payload.user_id).await?;

    Ok(Json(StartHikeResponse {
        planned_completion_time: outcome.planned_completion_time,
        expected_duration_ms: outcome.expected_duration_ms,
    }))
}

/// Stop a started session early for the requesting user
pub async fn stop_hike(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActingUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.lifecycle.stop(id, payload.user_id).await?;

    Ok(Json(StopHikeResponse {
        completed_record_id: outcome.completed_record_id,
        elapsed_ms: outcome.elapsed_ms,
    }))
}

/// Accept an invitation to a planned session
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActingUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let confirmed = state
        .store
        .confirm_participation(id, payload.user_id)
        .await?;

    if confirmed {
        Ok(Json(json!({"message": "Invitation accepted"})))
    } else {
        Err(ApiError::NotFound("invitation"))
    }
}

/// Decline an invitation or leave a session at planning stage
pub async fn decline_invitation(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.store.remove_participation(id, user_id).await?;

    if removed {
        Ok(Json(json!({"message": "Participation removed"})))
    } else {
        Err(ApiError::NotFound("participation"))
    }
}

/// List a user's completed hikes, most recent first
pub async fn completed_hikes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let hikes = state.store.completed_hikes_for_user(id).await?;

    Ok(Json(hikes))
}
