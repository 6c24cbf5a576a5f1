//! Hike service library
//!
//! Tracks users planning, performing, and completing group hiking sessions.
//! The session lifecycle manager starts a timed hike, arms a deferred
//! auto-completion, lets participants stop early, and guarantees exactly one
//! completion record per (user, session) event even when the timer and a
//! manual stop race.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod recorder;
pub mod routes;
pub mod state;
pub mod store;
pub mod timer;
