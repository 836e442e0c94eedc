pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /next.webp                 poll, redirects to the chosen artifact (GET)
/// /next                      poll, JSON description of the chosen animation (GET)
/// /generate                  run one generation pass (POST)
/// /doorbell                  ring the doorbell (POST)
/// /timers                    start (POST), cancel active (DELETE)
/// /timers/active             active countdown (GET)
/// /cleanup                   retention sweep (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/next.webp", get(handlers::playback::next_artifact))
        .route("/next", get(handlers::playback::next_animation))
        .route("/generate", post(handlers::generation::generate))
        .route("/doorbell", post(handlers::doorbell::ring))
        .route(
            "/timers",
            post(handlers::timers::start_timer).delete(handlers::timers::cancel_timers),
        )
        .route("/timers/active", get(handlers::timers::active_timer))
        .route("/cleanup", post(handlers::cleanup::sweep))
}
