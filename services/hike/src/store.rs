//! Persistent store abstraction for hike sessions
//!
//! The lifecycle manager consumes the store through this trait so the core
//! can run against PostgreSQL in production and against an in-memory store
//! in tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{CompletedHike, Participation, PlannedSession, SessionCompletion, Trail};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryHikeStore;
pub use postgres::PostgresHikeStore;

/// Store operations the session lifecycle depends on
#[async_trait]
pub trait HikeStore: Send + Sync {
    /// Create a planned session together with its initial participations:
    /// a confirmed row for the creator and an invited row per invitee
    async fn create_session(
        &self,
        trail_id: Uuid,
        scheduled_at: DateTime<Utc>,
        creator_id: Uuid,
        invited_user_ids: &[Uuid],
    ) -> DatabaseResult<Uuid>;

    /// Look up a planned session by id
    async fn find_session(&self, session_id: Uuid) -> DatabaseResult<Option<PlannedSession>>;

    /// Look up a trail by id
    async fn find_trail(&self, trail_id: Uuid) -> DatabaseResult<Option<Trail>>;

    /// Compare-and-set the started flag, recording the start timestamp and
    /// the starting user. Returns false when the session was already started.
    async fn mark_started(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> DatabaseResult<bool>;

    /// Whether a participation row exists for (session, user)
    async fn participation_exists(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool>;

    /// All participation rows for a session
    async fn participations_for_session(
        &self,
        session_id: Uuid,
    ) -> DatabaseResult<Vec<Participation>>;

    /// Accept an invitation: invited -> confirmed. Returns false when no
    /// invited row exists for (session, user).
    async fn confirm_participation(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool>;

    /// Decline or leave at planning stage: delete the participation row and,
    /// when it was the last one, the planned session itself. Returns false
    /// when no row existed.
    async fn remove_participation(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool>;

    /// The all-or-nothing completion unit. Within a single transaction:
    /// delete the subject's participation (zero rows deleted means this
    /// user's completion already happened and the unit is a no-op returning
    /// `None`), insert the archive row, and delete the planned session when
    /// no participations remain. Any failure rolls the whole unit back.
    async fn complete_session(&self, completion: &SessionCompletion)
    -> DatabaseResult<Option<Uuid>>;

    /// Look up the archive row for a (session, user) pair, if any
    async fn find_completion(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<CompletedHike>>;

    /// Archive rows for one user, most recent first
    async fn completed_hikes_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<CompletedHike>>;
}
