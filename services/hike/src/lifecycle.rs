//! Session lifecycle manager
//!
//! Orchestrates the plan -> start -> {auto-complete | manual-stop}
//! transitions and owns the guarantee that every (user, session) completion
//! is recorded exactly once. The race between the auto-completion timer and
//! a manual stop is decided by the timer registry's check-and-remove before
//! any persistent write happens; per-user exclusivity for the remaining
//! participants comes from the recorder's transactional unit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::error::DatabaseError;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::recorder::CompletionRecorder;
use crate::store::HikeStore;
use crate::timer::TimerRegistry;

/// Domain error for lifecycle operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Session, trail, or participation absent
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Start requested for a session whose started flag is already set
    #[error("hike session already started")]
    AlreadyStarted,

    /// Stop requested for a session that was never started
    #[error("hike session has not been started")]
    NotStarted,

    /// The requesting user's completion already exists; the authoritative
    /// archive row was written by the winning path
    #[error("hike session already completed")]
    AlreadyCompleted,

    /// The atomic completion unit failed and was rolled back
    #[error("failed to record hike completion: {0}")]
    RecordingFailed(#[source] DatabaseError),

    /// Any other store failure
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Result of the start operation
#[derive(Debug, Clone)]
pub struct StartOutcome {
    /// Advisory completion time for client display; the authoritative record
    /// is written by whichever path completes first
    pub planned_completion_time: DateTime<Utc>,
    pub expected_duration_ms: i64,
}

/// Result of the stop operation
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub completed_record_id: Uuid,
    pub elapsed_ms: i64,
}

/// Orchestrates session state transitions
#[derive(Clone)]
pub struct SessionLifecycle {
    store: Arc<dyn HikeStore>,
    recorder: CompletionRecorder,
    timers: TimerRegistry,
}

impl SessionLifecycle {
    /// Create a lifecycle manager over a store and a shared timer registry
    pub fn new(store: Arc<dyn HikeStore>, timers: TimerRegistry) -> Self {
        let recorder = CompletionRecorder::new(store.clone());
        Self {
            store,
            recorder,
            timers,
        }
    }

    /// Start a planned session: flip the started flag, record who started it
    /// and when, and arm the auto-completion timer for the trail's nominal
    /// duration with the requesting user as subject.
    pub async fn start(
        &self,
        session_id: Uuid,
        requesting_user: Uuid,
    ) -> Result<StartOutcome, LifecycleError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(LifecycleError::NotFound("hike session"))?;
        if session.started {
            return Err(LifecycleError::AlreadyStarted);
        }

        let trail = self
            .store
            .find_trail(session.trail_id)
            .await?
            .ok_or(LifecycleError::NotFound("trail"))?;

        // The starter becomes the auto-completion subject, so they must be
        // part of the hike
        if !self
            .store
            .participation_exists(session_id, requesting_user)
            .await?
        {
            return Err(LifecycleError::NotFound("participation"));
        }

        let started_at = Utc::now();
        if !self
            .store
            .mark_started(session_id, requesting_user, started_at)
            .await?
        {
            // A concurrent start flipped the flag first
            return Err(LifecycleError::AlreadyStarted);
        }

        let expected_ms = trail.expected_duration_ms.max(0);
        let recorder = self.recorder.clone();
        let trail_id = session.trail_id;
        self.timers.arm(
            session_id,
            Duration::from_millis(expected_ms as u64),
            async move {
                match recorder
                    .record(session_id, requesting_user, trail_id, expected_ms)
                    .await
                {
                    Ok(Some(record_id)) => {
                        info!(
                            "Auto-completed session {} as archive record {}",
                            session_id, record_id
                        );
                    }
                    Ok(None) => {
                        warn!(
                            "Auto-completion for session {} found nothing to record",
                            session_id
                        );
                    }
                    Err(e) => {
                        error!("Auto-completion for session {} failed: {}", session_id, e);
                    }
                }
            },
        );

        info!(
            "Started session {} for user {} ({} ms expected)",
            session_id, requesting_user, expected_ms
        );

        Ok(StartOutcome {
            planned_completion_time: started_at + TimeDelta::milliseconds(expected_ms),
            expected_duration_ms: expected_ms,
        })
    }

    /// Stop a started session early for the requesting user, canceling the
    /// auto-completion timer before anything is written.
    pub async fn stop(
        &self,
        session_id: Uuid,
        requesting_user: Uuid,
    ) -> Result<StopOutcome, LifecycleError> {
        let session = match self.store.find_session(session_id).await? {
            Some(session) => session,
            None => {
                // A completed hike retires the session row; when this user's
                // archive entry exists the right answer is a lost race, not a
                // missing resource
                if self
                    .store
                    .find_completion(session_id, requesting_user)
                    .await?
                    .is_some()
                {
                    return Err(LifecycleError::AlreadyCompleted);
                }
                return Err(LifecycleError::NotFound("hike session"));
            }
        };

        let started_at = match (session.started, session.started_at) {
            (true, Some(at)) => at,
            _ => return Err(LifecycleError::NotStarted),
        };

        // A user with no participation either already completed (their row
        // was consumed by the recorder) or was never part of the hike; in
        // neither case may they touch the timer
        if !self
            .store
            .participation_exists(session_id, requesting_user)
            .await?
        {
            if self
                .store
                .find_completion(session_id, requesting_user)
                .await?
                .is_some()
            {
                return Err(LifecycleError::AlreadyCompleted);
            }
            return Err(LifecycleError::NotFound("participation"));
        }

        // Cancel before any persistent mutation. A missing entry means the
        // timer fired (or is firing) for its subject, or that an earlier
        // stop by any participant consumed it. Neither case blocks this
        // caller: their participation row still exists (checked above), and
        // the recorder's delete-participation-first unit serializes against
        // a fire-in-progress, so a lost race surfaces as `None` below.
        self.timers.cancel(session_id);

        let elapsed_ms = Utc::now()
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0);

        match self
            .recorder
            .record(session_id, requesting_user, session.trail_id, elapsed_ms)
            .await?
        {
            Some(record_id) => {
                info!(
                    "Stopped session {} for user {} after {} ms",
                    session_id, requesting_user, elapsed_ms
                );
                Ok(StopOutcome {
                    completed_record_id: record_id,
                    elapsed_ms,
                })
            }
            // Lost a per-user race: the completion already exists
            None => Err(LifecycleError::AlreadyCompleted),
        }
    }
}
