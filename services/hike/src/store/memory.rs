//! In-memory hike store
//!
//! Backs the lifecycle tests and local development without a database. The
//! completion unit mirrors the transactional semantics of the PostgreSQL
//! store: the subject's participation is taken first, and nothing is written
//! when it is already gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{
    CompletedHike, Participation, ParticipationState, PlannedSession, SessionCompletion, Trail,
};
use crate::store::HikeStore;

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<Uuid, PlannedSession>,
    participations: Vec<Participation>,
    trails: HashMap<Uuid, Trail>,
    completed: Vec<CompletedHike>,
}

/// Hike store keeping everything behind one mutex
#[derive(Clone, Default)]
pub struct InMemoryHikeStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryHikeStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("in-memory store mutex poisoned")
    }

    /// Seed a trail and return its id
    pub fn insert_trail(&self, name: &str, expected_duration_ms: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.state().trails.insert(
            id,
            Trail {
                id,
                name: name.to_string(),
                expected_duration_ms,
            },
        );
        id
    }

    /// Snapshot of every archive row, in insertion order
    pub fn completed_hikes(&self) -> Vec<CompletedHike> {
        self.state().completed.clone()
    }

    /// Whether the planned session row still exists
    pub fn session_exists(&self, session_id: Uuid) -> bool {
        self.state().sessions.contains_key(&session_id)
    }
}

#[async_trait]
impl HikeStore for InMemoryHikeStore {
    async fn create_session(
        &self,
        trail_id: Uuid,
        scheduled_at: DateTime<Utc>,
        creator_id: Uuid,
        invited_user_ids: &[Uuid],
    ) -> DatabaseResult<Uuid> {
        let mut state = self.state();
        let session_id = Uuid::new_v4();

        state.sessions.insert(
            session_id,
            PlannedSession {
                id: session_id,
                trail_id,
                creator_id,
                scheduled_at,
                started: false,
                started_at: None,
                started_by: None,
            },
        );

        state.participations.push(Participation {
            session_id,
            user_id: creator_id,
            state: ParticipationState::Confirmed,
        });
        for invited in invited_user_ids {
            if *invited == creator_id {
                continue;
            }
            state.participations.push(Participation {
                session_id,
                user_id: *invited,
                state: ParticipationState::Invited,
            });
        }

        Ok(session_id)
    }

    async fn find_session(&self, session_id: Uuid) -> DatabaseResult<Option<PlannedSession>> {
        Ok(self.state().sessions.get(&session_id).cloned())
    }

    async fn find_trail(&self, trail_id: Uuid) -> DatabaseResult<Option<Trail>> {
        Ok(self.state().trails.get(&trail_id).cloned())
    }

    async fn mark_started(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let mut state = self.state();
        match state.sessions.get_mut(&session_id) {
            Some(session) if !session.started => {
                session.started = true;
                session.started_at = Some(at);
                session.started_by = Some(user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn participation_exists(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        Ok(self
            .state()
            .participations
            .iter()
            .any(|p| p.session_id == session_id && p.user_id == user_id))
    }

    async fn participations_for_session(
        &self,
        session_id: Uuid,
    ) -> DatabaseResult<Vec<Participation>> {
        Ok(self
            .state()
            .participations
            .iter()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn confirm_participation(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let mut state = self.state();
        for participation in state.participations.iter_mut() {
            if participation.session_id == session_id
                && participation.user_id == user_id
                && participation.state == ParticipationState::Invited
            {
                participation.state = ParticipationState::Confirmed;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn remove_participation(&self, session_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let mut state = self.state();
        let before = state.participations.len();
        state
            .participations
            .retain(|p| !(p.session_id == session_id && p.user_id == user_id));
        if state.participations.len() == before {
            return Ok(false);
        }

        let remaining = state
            .participations
            .iter()
            .any(|p| p.session_id == session_id);
        if !remaining {
            state.sessions.remove(&session_id);
        }

        Ok(true)
    }

    async fn complete_session(
        &self,
        completion: &SessionCompletion,
    ) -> DatabaseResult<Option<Uuid>> {
        let mut state = self.state();

        let before = state.participations.len();
        state.participations.retain(|p| {
            !(p.session_id == completion.session_id && p.user_id == completion.user_id)
        });
        if state.participations.len() == before {
            // Already completed for this user; nothing to record
            return Ok(None);
        }

        let record_id = Uuid::new_v4();
        state.completed.push(CompletedHike {
            id: record_id,
            session_id: completion.session_id,
            user_id: completion.user_id,
            trail_id: completion.trail_id,
            completed_at: completion.completed_at,
            elapsed_ms: completion.elapsed_ms,
        });

        let remaining = state
            .participations
            .iter()
            .any(|p| p.session_id == completion.session_id);
        if !remaining {
            state.sessions.remove(&completion.session_id);
        }

        Ok(Some(record_id))
    }

    async fn find_completion(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<Option<CompletedHike>> {
        Ok(self
            .state()
            .completed
            .iter()
            .find(|c| c.session_id == session_id && c.user_id == user_id)
            .cloned())
    }

    async fn completed_hikes_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<CompletedHike>> {
        let mut hikes: Vec<CompletedHike> = self
            .state()
            .completed
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        hikes.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(hikes)
    }
}
