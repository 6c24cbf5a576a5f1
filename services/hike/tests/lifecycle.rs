//! Scenario tests for the session lifecycle manager
//!
//! These run against the in-memory store and the real timer registry, with
//! trail durations shrunk to milliseconds so the auto-completion path can be
//! exercised directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use hike::lifecycle::{LifecycleError, SessionLifecycle};
use hike::store::{HikeStore, InMemoryHikeStore};
use hike::timer::TimerRegistry;

struct Fixture {
    store: InMemoryHikeStore,
    lifecycle: SessionLifecycle,
    timers: TimerRegistry,
    trail_id: Uuid,
}

fn fixture(trail_duration_ms: i64) -> Fixture {
    let store = InMemoryHikeStore::new();
    let trail_id = store.insert_trail("Test Trail", trail_duration_ms);
    let timers = TimerRegistry::new();
    let lifecycle = SessionLifecycle::new(
        Arc::new(store.clone()) as Arc<dyn HikeStore>,
        timers.clone(),
    );
    Fixture {
        store,
        lifecycle,
        timers,
        trail_id,
    }
}

const ONE_HOUR_MS: i64 = 3_600_000;

#[tokio::test]
async fn start_then_stop_records_wall_time_and_retires_the_session() {
    let fx = fixture(ONE_HOUR_MS);
    let hiker = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), hiker, &[])
        .await
        .unwrap();

    let started = fx.lifecycle.start(session_id, hiker).await.unwrap();
    assert_eq!(started.expected_duration_ms, ONE_HOUR_MS);
    assert!(fx.timers.is_armed(session_id));

    tokio::time::sleep(Duration::from_millis(150)).await;

    let stopped = fx.lifecycle.stop(session_id, hiker).await.unwrap();
    // Manual stop measures wall time, not the trail's nominal duration
    assert!(
        (100..5_000).contains(&stopped.elapsed_ms),
        "elapsed {} ms out of tolerance",
        stopped.elapsed_ms
    );

    let archive = fx.store.completed_hikes();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive[0].id, stopped.completed_record_id);
    assert_eq!(archive[0].user_id, hiker);
    assert_eq!(archive[0].trail_id, fx.trail_id);

    // Sole participant stopped, so the planned session is retired and the
    // timer entry consumed
    assert!(!fx.store.session_exists(session_id));
    assert!(!fx.timers.is_armed(session_id));
}

#[tokio::test]
async fn start_is_rejected_when_already_started() {
    let fx = fixture(ONE_HOUR_MS);
    let hiker = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), hiker, &[])
        .await
        .unwrap();

    fx.lifecycle.start(session_id, hiker).await.unwrap();
    let err = fx.lifecycle.start(session_id, hiker).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyStarted));

    // No state change: the session is still live and its timer still armed
    assert!(fx.store.session_exists(session_id));
    assert!(fx.timers.is_armed(session_id));
    assert!(fx.store.completed_hikes().is_empty());
}

#[tokio::test]
async fn stop_is_rejected_when_never_started() {
    let fx = fixture(ONE_HOUR_MS);
    let hiker = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), hiker, &[])
        .await
        .unwrap();

    let err = fx.lifecycle.stop(session_id, hiker).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotStarted));
    assert!(fx.store.completed_hikes().is_empty());
}

#[tokio::test]
async fn operations_on_unknown_sessions_return_not_found() {
    let fx = fixture(ONE_HOUR_MS);
    let hiker = Uuid::new_v4();

    let err = fx.lifecycle.start(Uuid::new_v4(), hiker).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));

    let err = fx.lifecycle.stop(Uuid::new_v4(), hiker).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
}

#[tokio::test]
async fn non_participants_cannot_start_or_stop() {
    let fx = fixture(ONE_HOUR_MS);
    let creator = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), creator, &[])
        .await
        .unwrap();

    let err = fx.lifecycle.start(session_id, stranger).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));

    fx.lifecycle.start(session_id, creator).await.unwrap();
    let err = fx.lifecycle.stop(session_id, stranger).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));

    // The stranger's rejected stop must not have consumed the timer
    assert!(fx.timers.is_armed(session_id));
}

#[tokio::test]
async fn stop_after_the_timer_fired_loses_cleanly() {
    let fx = fixture(20);
    let hiker = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), hiker, &[])
        .await
        .unwrap();

    fx.lifecycle.start(session_id, hiker).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Auto-fire recorded the nominal duration and retired the session
    let archive = fx.store.completed_hikes();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive[0].elapsed_ms, 20);
    assert!(!fx.store.session_exists(session_id));

    let err = fx.lifecycle.stop(session_id, hiker).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyCompleted));
    assert_eq!(fx.store.completed_hikes().len(), 1);
}

#[tokio::test]
async fn pre_fired_timer_yields_already_completed_while_the_session_lives() {
    // Two participants keep the session alive past the auto-fire, so the
    // subject's late stop is classified as a lost race, not a missing session
    let fx = fixture(20);
    let creator = Uuid::new_v4();
    let buddy = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), creator, &[buddy])
        .await
        .unwrap();
    fx.store
        .confirm_participation(session_id, buddy)
        .await
        .unwrap();

    fx.lifecycle.start(session_id, creator).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fx.store.completed_hikes().len(), 1);
    assert!(fx.store.session_exists(session_id));

    let err = fx.lifecycle.stop(session_id, creator).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyCompleted));
    assert_eq!(fx.store.completed_hikes().len(), 1);
}

#[tokio::test]
async fn concurrent_stop_and_fire_record_exactly_once() {
    for _ in 0..10 {
        let fx = fixture(15);
        let hiker = Uuid::new_v4();
        let session_id = fx
            .store
            .create_session(fx.trail_id, Utc::now(), hiker, &[])
            .await
            .unwrap();

        fx.lifecycle.start(session_id, hiker).await.unwrap();

        let racer = fx.lifecycle.clone();
        let stop_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            racer.stop(session_id, hiker).await
        });

        let stop_result = stop_task.await.expect("stop task panicked");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let archive = fx.store.completed_hikes();
        assert_eq!(archive.len(), 1, "exactly one archive row per session");
        assert!(!fx.store.session_exists(session_id));

        match stop_result {
            // Manual stop won the race; the row is the one it wrote
            Ok(outcome) => assert_eq!(archive[0].id, outcome.completed_record_id),
            // Timer won; the row carries the nominal duration
            Err(LifecycleError::AlreadyCompleted) => assert_eq!(archive[0].elapsed_ms, 15),
            Err(other) => panic!("unexpected stop outcome: {}", other),
        }
    }
}

#[tokio::test]
async fn every_participant_records_an_independent_completion() {
    let fx = fixture(ONE_HOUR_MS);
    let creator = Uuid::new_v4();
    let second = Uuid::new_v4();
    let third = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), creator, &[second, third])
        .await
        .unwrap();
    fx.store
        .confirm_participation(session_id, second)
        .await
        .unwrap();
    fx.store
        .confirm_participation(session_id, third)
        .await
        .unwrap();

    fx.lifecycle.start(session_id, creator).await.unwrap();

    // The starter finishes last: an earlier stop consumed the timer entry,
    // which must not block their own completion
    for hiker in [second, third, creator] {
        fx.lifecycle.stop(session_id, hiker).await.unwrap();
    }

    let archive = fx.store.completed_hikes();
    assert_eq!(archive.len(), 3);
    assert!(!fx.store.session_exists(session_id));

    // A second stop by any of them is a benign lost race
    let err = fx.lifecycle.stop(session_id, second).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyCompleted));
}

#[tokio::test]
async fn starter_can_stop_after_another_participant_stopped_first() {
    let fx = fixture(ONE_HOUR_MS);
    let creator = Uuid::new_v4();
    let buddy = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), creator, &[buddy])
        .await
        .unwrap();
    fx.store
        .confirm_participation(session_id, buddy)
        .await
        .unwrap();

    fx.lifecycle.start(session_id, creator).await.unwrap();

    // The buddy's stop cancels the auto-completion timer for the session
    fx.lifecycle.stop(session_id, buddy).await.unwrap();
    assert!(!fx.timers.is_armed(session_id));
    assert!(fx.store.session_exists(session_id));

    // With the timer gone, the starter still records their own completion
    let stopped = fx.lifecycle.stop(session_id, creator).await.unwrap();

    let archive = fx.store.completed_hikes();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive[1].id, stopped.completed_record_id);
    assert_eq!(archive[1].user_id, creator);
    assert!(!fx.store.session_exists(session_id));
}

#[tokio::test]
async fn timer_fire_leaves_remaining_participants_able_to_finish() {
    let fx = fixture(25);
    let creator = Uuid::new_v4();
    let buddy = Uuid::new_v4();
    let session_id = fx
        .store
        .create_session(fx.trail_id, Utc::now(), creator, &[buddy])
        .await
        .unwrap();
    fx.store
        .confirm_participation(session_id, buddy)
        .await
        .unwrap();

    fx.lifecycle.start(session_id, creator).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Auto-fire completed the starter with the nominal duration; the buddy's
    // participation keeps the session alive
    let archive = fx.store.completed_hikes();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive[0].user_id, creator);
    assert_eq!(archive[0].elapsed_ms, 25);
    assert!(fx.store.session_exists(session_id));

    let stopped = fx.lifecycle.stop(session_id, buddy).await.unwrap();
    let archive = fx.store.completed_hikes();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive[1].id, stopped.completed_record_id);
    assert!(!fx.store.session_exists(session_id));
}
