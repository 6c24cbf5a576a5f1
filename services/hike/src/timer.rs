//! Process-wide timer registry for deferred auto-completion actions
//!
//! One registry instance is created at process start and shared by all
//! request handlers. Each armed entry is a spawned tokio task that sleeps for
//! the trail's nominal duration and then tries to *claim* its entry. Claiming
//! and canceling are both check-and-remove operations under the same mutex,
//! so for any session exactly one of {fire handler, cancel call} observes
//! that it won; the losing side does nothing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

struct TimerEntry {
    /// Arm generation; a stale task from a superseded arm cannot claim a
    /// newer entry for the same session
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    entries: Mutex<HashMap<Uuid, TimerEntry>>,
    next_generation: AtomicU64,
}

/// Registry mapping session ids to armed deferred actions
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<Inner>,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    /// Create an empty timer registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, TimerEntry>> {
        self.inner
            .entries
            .lock()
            .expect("timer registry mutex poisoned")
    }

    /// Arm a deferred action to run after `delay`, replacing any prior entry
    /// for the same session id
    pub fn arm<F>(&self, session_id: Uuid, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        // The entry must be visible before the task can wake, otherwise a
        // zero-delay fire would find nothing to claim
        {
            let mut entries = self.entries();
            if let Some(previous) = entries.insert(
                session_id,
                TimerEntry {
                    generation,
                    handle: None,
                },
            ) {
                if let Some(handle) = previous.handle {
                    handle.abort();
                }
            }
        }

        let registry = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if registry.claim(session_id, generation) {
                action.await;
            } else {
                debug!("timer for session {} was canceled or superseded", session_id);
            }
        });

        let mut entries = self.entries();
        match entries.get_mut(&session_id) {
            Some(entry) if entry.generation == generation => {
                entry.handle = Some(handle);
            }
            // Canceled or re-armed between the insert and the spawn; the
            // task's claim will fail on its own, but don't let it linger
            _ => handle.abort(),
        }
    }

    /// Atomically remove the entry for `session_id` if it has not yet fired.
    /// Returns false when no entry exists: never armed, already fired, or
    /// fire-in-progress.
    pub fn cancel(&self, session_id: Uuid) -> bool {
        let entry = self.entries().remove(&session_id);
        match entry {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Whether a live entry exists for the session
    pub fn is_armed(&self, session_id: Uuid) -> bool {
        self.entries().contains_key(&session_id)
    }

    /// Check-and-remove performed by the fire handler; winning the claim is
    /// the permission to run the action
    fn claim(&self, session_id: Uuid, generation: u64) -> bool {
        let mut entries = self.entries();
        match entries.get(&session_id) {
            Some(entry) if entry.generation == generation => {
                entries.remove(&session_id);
                true
            }
            _ => false,
        }
    }
}
