//! Hike service models for domain entities and request/response payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled group hike instance, before or during execution
#[derive(Debug, Clone, Serialize)]
pub struct PlannedSession {
    pub id: Uuid,
    pub trail_id: Uuid,
    pub creator_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    /// Transitions false -> true exactly once, via the start operation
    pub started: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// Subject of the armed auto-completion: the user who issued start
    pub started_by: Option<Uuid>,
}

/// Confirmation state of a participation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationState {
    Invited,
    Confirmed,
}

impl ParticipationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationState::Invited => "invited",
            ParticipationState::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invited" => Some(ParticipationState::Invited),
            "confirmed" => Some(ParticipationState::Confirmed),
            _ => None,
        }
    }
}

/// A user's relationship to a planned session
#[derive(Debug, Clone, Serialize)]
pub struct Participation {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub state: ParticipationState,
}

/// Immutable archive record of a finished hike for one user
#[derive(Debug, Clone, Serialize)]
pub struct CompletedHike {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub trail_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

/// Trail catalog entry, read-only as far as this service is concerned
#[derive(Debug, Clone, Serialize)]
pub struct Trail {
    pub id: Uuid,
    pub name: String,
    /// Nominal time to complete the trail, used as the auto-completion delay
    pub expected_duration_ms: i64,
}

/// The inputs of the completion recorder's all-or-nothing unit
#[derive(Debug, Clone)]
pub struct SessionCompletion {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub trail_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

/// Request to plan a new hike session
#[derive(Deserialize)]
pub struct PlanHikeRequest {
    pub trail_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub creator_id: Uuid,
    #[serde(default)]
    pub invited_user_ids: Vec<Uuid>,
}

/// Response for planning a hike session
#[derive(Serialize)]
pub struct PlanHikeResponse {
    pub session_id: Uuid,
}

/// Request body carrying the acting user for start/stop/accept operations
#[derive(Deserialize)]
pub struct ActingUserRequest {
    pub user_id: Uuid,
}

/// Response for starting a hike session
#[derive(Serialize)]
pub struct StartHikeResponse {
    pub planned_completion_time: DateTime<Utc>,
    pub expected_duration_ms: i64,
}

/// Response for stopping a hike session
#[derive(Serialize)]
pub struct StopHikeResponse {
    pub completed_record_id: Uuid,
    pub elapsed_ms: i64,
}

/// Response for the session detail endpoint
#[derive(Serialize)]
pub struct SessionDetailResponse {
    pub session: PlannedSession,
    pub participations: Vec<Participation>,
}
