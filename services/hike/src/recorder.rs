//! Completion recorder
//!
//! Turns a finished hike (auto-fired or manually stopped) into an archive
//! row, delegating the all-or-nothing write-and-retire to the store's
//! transactional completion unit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::lifecycle::LifecycleError;
use crate::models::SessionCompletion;
use crate::store::HikeStore;

/// Records completions against the persistent store
#[derive(Clone)]
pub struct CompletionRecorder {
    store: Arc<dyn HikeStore>,
}

impl CompletionRecorder {
    /// Create a new completion recorder
    pub fn new(store: Arc<dyn HikeStore>) -> Self {
        Self { store }
    }

    /// Write the archive row for one user's completion and retire the
    /// planned session when no participations remain. Returns `Ok(None)`
    /// when this user's completion was already recorded; the store's unit is
    /// rolled back in that case and on any failure.
    pub async fn record(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        trail_id: Uuid,
        elapsed_ms: i64,
    ) -> Result<Option<Uuid>, LifecycleError> {
        let completion = SessionCompletion {
            session_id,
            user_id,
            trail_id,
            completed_at: Utc::now(),
            elapsed_ms,
        };

        match self.store.complete_session(&completion).await {
            Ok(Some(record_id)) => {
                info!(
                    "Recorded completion {} for session {} user {} ({} ms)",
                    record_id, session_id, user_id, elapsed_ms
                );
                Ok(Some(record_id))
            }
            Ok(None) => {
                warn!(
                    "Completion for session {} user {} was already recorded",
                    session_id, user_id
                );
                Ok(None)
            }
            Err(e) => {
                error!(
                    "Failed to record completion for session {} user {}: {}",
                    session_id, user_id, e
                );
                Err(LifecycleError::RecordingFailed(e))
            }
        }
    }
}
