//! Countdown timer handlers.
//!
//! Routes:
//! - `POST   /timers`        -- start a timer
//! - `DELETE /timers`        -- cancel active timers
//! - `GET    /timers/active` -- the running timer, if any

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use marquee_core::countdown;
use marquee_core::source::AnimationSource;
use marquee_core::types::{DbId, Timestamp};
use marquee_db::models::timer::{CreateTimer, Timer};
use marquee_db::store::{AnimationStore, TimerStore};
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// A timer as seen by clients.
#[derive(Debug, Serialize)]
pub struct TimerResponse {
    pub id: DbId,
    pub minutes: i32,
    pub created_at: Timestamp,
    pub ends_at: Timestamp,
    /// `MM:SS` left at response time.
    pub remaining: String,
}

impl TimerResponse {
    fn new(timer: &Timer, now: Timestamp) -> Self {
        let ends_at = timer.ends_at();
        Self {
            id: timer.id,
            minutes: timer.minutes,
            created_at: timer.created_at,
            ends_at,
            remaining: countdown::format_remaining(countdown::remaining(ends_at, now)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub canceled: u64,
    /// Upcoming countdown slices withdrawn from playback.
    pub slices_removed: u64,
}

/// POST /api/v1/timers
pub async fn start_timer(
    State(state): State<AppState>,
    Json(input): Json<CreateTimer>,
) -> AppResult<impl IntoResponse> {
    countdown::validate_minutes(input.minutes)?;
    let timer = state.store.create_timer(input.minutes).await?;
    tracing::info!(timer_id = timer.id, minutes = timer.minutes, "Timer started");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: TimerResponse::new(&timer, Utc::now()),
        }),
    ))
}

/// DELETE /api/v1/timers
///
/// Also drops the countdown slices already rendered for the canceled timers,
/// so they are neither shown nor counted as coverage for the next timer.
pub async fn cancel_timers(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let canceled = state.store.cancel_timers(now).await?;
    let slices_removed = state
        .store
        .delete_upcoming(AnimationSource::CountdownTimer, now)
        .await?;
    tracing::info!(canceled, slices_removed, "Timers canceled");
    Ok(Json(DataResponse {
        data: CancelResponse {
            canceled,
            slices_removed,
        },
    }))
}

/// GET /api/v1/timers/active
///
/// `data` is `null` when no timer is running.
pub async fn active_timer(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let timer = state.store.active_timer(now).await?;
    Ok(Json(DataResponse {
        data: timer.as_ref().map(|t| TimerResponse::new(t, now)),
    }))
}
