//! Application state shared across handlers

use std::sync::Arc;

use crate::lifecycle::SessionLifecycle;
use crate::store::HikeStore;
use crate::timer::TimerRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HikeStore>,
    pub lifecycle: SessionLifecycle,
    pub timers: TimerRegistry,
}

impl AppState {
    /// Build the state over a store, wiring the lifecycle manager to a fresh
    /// timer registry shared by every handler
    pub fn new(store: Arc<dyn HikeStore>) -> Self {
        let timers = TimerRegistry::new();
        let lifecycle = SessionLifecycle::new(store.clone(), timers.clone());
        Self {
            store,
            lifecycle,
            timers,
        }
    }
}
