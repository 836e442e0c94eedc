//! Picks what a polling display shows next.

use std::sync::Arc;

use chrono::Duration;
use marquee_core::playback::{rank, SelectionSummary};
use marquee_core::source::AnimationSource;
use marquee_core::types::Timestamp;
use marquee_db::models::animation::{Animation, CandidateWindow, CreateAnimation};
use marquee_db::store::{AnimationStore, Store, StoreError};

use crate::config::GenerationConfig;

/// The animation chosen for one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub animation: Animation,
    /// Artifact URL, or the placeholder when nothing was rendered.
    pub url: String,
    /// Whether the pool was empty and a placeholder row was created.
    pub synthesized: bool,
}

impl Selection {
    fn new(animation: Animation, synthesized: bool) -> Self {
        Self {
            url: animation.url(),
            animation,
            synthesized,
        }
    }
}

#[derive(Clone)]
pub struct PlaybackSelector {
    store: Arc<dyn Store>,
    lookahead: Duration,
    fresh_window: Duration,
}

impl PlaybackSelector {
    pub fn new(store: Arc<dyn Store>, config: &GenerationConfig) -> Self {
        Self {
            store,
            lookahead: config.lookahead,
            fresh_window: config.fresh_window,
        }
    }

    /// Candidate filter for a poll at `now`.
    pub fn window(&self, now: Timestamp) -> CandidateWindow {
        CandidateWindow {
            now,
            served_since: now - self.fresh_window,
            lookahead_until: now + self.lookahead,
        }
    }

    /// Choose, mark served and return the next animation.
    pub async fn select(&self, now: Timestamp) -> Result<Selection, StoreError> {
        let pool = self.store.candidates(&self.window(now)).await?;
        // Served one-shots still count towards variety.
        let summary = SelectionSummary::from_candidates(now, &pool);
        let mut eligible: Vec<Animation> = pool
            .into_iter()
            .filter(|a| !(a.source.is_one_shot() && a.served_at.is_some()))
            .collect();
        rank(&mut eligible, &summary);

        for candidate in eligible {
            match self.store.mark_served(candidate.id, now).await? {
                Some(served) => {
                    tracing::debug!(
                        animation_id = served.id,
                        source = %served.source,
                        start_time = ?served.start_time,
                        "Animation selected",
                    );
                    return Ok(Selection::new(served, false));
                }
                // Served or deleted by a concurrent poll since the pool was read.
                None => tracing::debug!(
                    animation_id = candidate.id,
                    "Candidate no longer servable, trying next",
                ),
            }
        }

        let placeholder = self
            .store
            .create_animation(&CreateAnimation::ephemeral(AnimationSource::Static, None))
            .await?;
        let served = self
            .store
            .mark_served(placeholder.id, now)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "Animation",
                id: placeholder.id,
            })?;
        tracing::info!(animation_id = served.id, "No content available, serving placeholder");
        Ok(Selection::new(served, true))
    }
}
