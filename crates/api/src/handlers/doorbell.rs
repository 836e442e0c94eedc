use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use marquee_core::source::AnimationSource;
use marquee_db::models::animation::CreateAnimation;
use marquee_db::store::AnimationStore;
use marquee_pipeline::generator::DOORBELL_ARTIFACT;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/doorbell
///
/// Queues the doorbell animation; it preempts everything on the next poll.
pub async fn ring(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let input = CreateAnimation::ephemeral(
        AnimationSource::Doorbell,
        Some(DOORBELL_ARTIFACT.to_string()),
    );
    let animation = state.store.create_animation(&input).await?;
    tracing::info!(animation_id = animation.id, "Doorbell rang");
    Ok((StatusCode::CREATED, Json(DataResponse { data: animation })))
}
