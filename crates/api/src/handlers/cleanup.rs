use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use marquee_pipeline::retention;

use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/v1/cleanup
///
/// Runs one retention sweep and reports what was removed.
pub async fn sweep(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let cutoff = Utc::now() - state.config.retention();
    let report = retention::sweep(
        state.store.as_ref(),
        &state.config.generation.render_dir,
        cutoff,
    )
    .await?;
    Ok(report.status_text())
}
