//! Integration tests for the generation trigger.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_text, get, post};
use marquee_core::source::AnimationSource;
use marquee_db::memory::MemoryStore;
use marquee_db::models::lock::GENERATE_LOCK;

// ---------------------------------------------------------------------------
// Test: Nothing is generated while no display is polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dormant_display_generates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let app = common::build_test_app(store.clone(), dir.path());

    let response = post(app, "/api/v1/generate").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Not running");
    assert!(store.animations().is_empty());
    // The lease is returned even when the pass does nothing.
    assert!(!store.lock_row(GENERATE_LOCK).unwrap().acquired);
}

// ---------------------------------------------------------------------------
// Test: After a poll, a pass fills the clock timeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pass_after_poll_generates_clock_segment() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let app = common::build_test_app(store.clone(), dir.path());

    get(app.clone(), "/api/v1/next.webp").await;
    let response = post(app, "/api/v1/generate").await;

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("Now playing: probe disabled"), "{text}");
    assert!(text.contains("Clock: Generated 8"), "{text}");

    let clocks: Vec<_> = store
        .animations()
        .into_iter()
        .filter(|a| a.source.is_clock())
        .collect();
    assert_eq!(clocks.len(), 8);
    for clock in &clocks {
        assert!(dir.path().join("render").join(clock.file_path.as_ref().unwrap()).exists());
    }
}

// ---------------------------------------------------------------------------
// Test: A second pass does not duplicate covered slots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_passes_do_not_duplicate_slots() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let app = common::build_test_app(store.clone(), dir.path());

    get(app.clone(), "/api/v1/next.webp").await;
    post(app.clone(), "/api/v1/generate").await;
    let first = store.animations().len();
    let response = post(app, "/api/v1/generate").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.animations().len(), first);
}

// ---------------------------------------------------------------------------
// Test: A held lock rejects the pass without writing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn held_lock_returns_409() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.set_lock_acquired(GENERATE_LOCK, Some(Utc::now() + Duration::minutes(5)));
    let app = common::build_test_app(store.clone(), dir.path());

    get(app.clone(), "/api/v1/next.webp").await;
    let response = post(app, "/api/v1/generate").await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_text(response).await, "Generation already running");
    // Only the placeholder row from the poll.
    let rows = store.animations();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source, AnimationSource::Static);
}
