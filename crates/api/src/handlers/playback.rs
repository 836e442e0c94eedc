//! Display polling.
//!
//! Routes:
//! - `GET /next.webp` -- choose the next animation and redirect to it
//! - `GET /next`      -- choose the next animation and describe it

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, LOCATION};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use marquee_core::source::AnimationSource;
use marquee_core::types::{DbId, Timestamp};
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// What the display is about to show.
#[derive(Debug, Serialize)]
pub struct NextAnimation {
    pub id: DbId,
    pub url: String,
    pub source: AnimationSource,
    pub start_time: Option<Timestamp>,
    pub served_at: Option<Timestamp>,
    /// The pool was empty and a placeholder was served.
    pub placeholder: bool,
}

/// GET /api/v1/next.webp
///
/// Every poll marks its pick as served, so the redirect must never be cached.
pub async fn next_artifact(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let selection = state.selector.select(Utc::now()).await?;
    Ok((
        StatusCode::FOUND,
        [(LOCATION, selection.url), (CACHE_CONTROL, "no-cache".to_string())],
    ))
}

/// GET /api/v1/next
pub async fn next_animation(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let selection = state.selector.select(Utc::now()).await?;
    let animation = selection.animation;
    Ok(Json(DataResponse {
        data: NextAnimation {
            id: animation.id,
            url: selection.url,
            source: animation.source,
            start_time: animation.start_time,
            served_at: animation.served_at,
            placeholder: selection.synthesized,
        },
    }))
}
