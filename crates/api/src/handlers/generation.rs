//! Handler for the generation trigger.
//!
//! Routes:
//! - `POST /generate` -- run one generation pass

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use marquee_pipeline::orchestrator::PassOutcome;

use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/v1/generate
///
/// Responds with the pass's status lines as plain text: 200 when the pass
/// ran (or the display is dormant), 409 when another pass holds the lock and
/// 503 when the lock row was momentarily contended.
pub async fn generate(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let outcome = state.orchestrator.run_pass().await?;
    let status = match outcome {
        PassOutcome::Completed(_) | PassOutcome::NotRunning => StatusCode::OK,
        PassOutcome::AlreadyRunning => StatusCode::CONFLICT,
        PassOutcome::Contended => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status, outcome.status_text()))
}
