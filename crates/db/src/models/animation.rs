//! Animation entity: one pre-rendered, looping piece of display content.

use marquee_core::playback::PlaybackCandidate;
use marquee_core::source::AnimationSource;
use marquee_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// URL prefix under which rendered artifacts are served.
pub const ARTIFACT_URL_PREFIX: &str = "/render/";

/// Served when an animation has no rendered artifact.
pub const MISSING_ARTIFACT_URL: &str = "/static/missing.webp";

/// Metadata key holding the identity of the item an animation shows.
pub const META_ITEM_ID: &str = "id";

/// Metadata key flagging countdown content near completion.
pub const META_IMPORTANT: &str = "important";

/// A row from the `animations` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Animation {
    pub id: DbId,
    pub created_at: Timestamp,
    /// Artifact file name relative to the render directory.
    pub file_path: Option<String>,
    pub start_time: Option<Timestamp>,
    pub served_at: Option<Timestamp>,
    #[sqlx(try_from = "String")]
    pub source: AnimationSource,
    pub metadata: serde_json::Value,
}

impl Animation {
    /// Where the display should fetch this animation from.
    pub fn url(&self) -> String {
        match &self.file_path {
            Some(path) => format!("{ARTIFACT_URL_PREFIX}{path}"),
            None => MISSING_ARTIFACT_URL.to_string(),
        }
    }

    /// The `id` recorded in metadata, if any.
    pub fn item_id(&self) -> Option<&str> {
        self.metadata.get(META_ITEM_ID).and_then(|v| v.as_str())
    }
}

impl PlaybackCandidate for Animation {
    fn source(&self) -> AnimationSource {
        self.source
    }

    fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    fn served_at(&self) -> Option<Timestamp> {
        self.served_at
    }

    fn is_important(&self) -> bool {
        self.metadata
            .get(META_IMPORTANT)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// DTO for inserting an animation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAnimation {
    pub file_path: Option<String>,
    pub start_time: Option<Timestamp>,
    pub source: AnimationSource,
    pub metadata: serde_json::Value,
}

impl CreateAnimation {
    /// Ephemeral content: no slot, eligible as soon as it exists.
    pub fn ephemeral(source: AnimationSource, file_path: Option<String>) -> Self {
        Self {
            file_path,
            start_time: None,
            source,
            metadata: serde_json::json!({}),
        }
    }

    /// Content scheduled for a slot.
    pub fn scheduled(source: AnimationSource, start_time: Timestamp, file_path: String) -> Self {
        Self {
            file_path: Some(file_path),
            start_time: Some(start_time),
            source,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Filter describing the playback candidate pool at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateWindow {
    pub now: Timestamp,
    /// Rows served at or after this instant are still fresh.
    pub served_since: Timestamp,
    /// Scheduled rows starting in `(now, lookahead_until]` are eligible.
    pub lookahead_until: Timestamp,
}

impl CandidateWindow {
    /// Whether a row belongs in the pool.
    pub fn admits(&self, animation: &Animation) -> bool {
        let fresh = animation.served_at.is_some_and(|t| t >= self.served_since);
        let pending = animation.start_time.is_none() && animation.served_at.is_none();
        let upcoming = animation
            .start_time
            .is_some_and(|t| t > self.now && t <= self.lookahead_until);
        fresh || pending || upcoming
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn row(start_time: Option<Timestamp>, served_at: Option<Timestamp>) -> Animation {
        Animation {
            id: 1,
            created_at: Utc.with_ymd_and_hms(2024, 5, 11, 11, 0, 0).unwrap(),
            file_path: None,
            start_time,
            served_at,
            source: AnimationSource::ClockRays,
            metadata: serde_json::json!({}),
        }
    }

    fn window() -> CandidateWindow {
        let now = Utc.with_ymd_and_hms(2024, 5, 11, 12, 0, 0).unwrap();
        CandidateWindow {
            now,
            served_since: now - Duration::minutes(1),
            lookahead_until: now + Duration::minutes(30),
        }
    }

    #[test]
    fn url_falls_back_to_placeholder() {
        let mut a = row(None, None);
        assert_eq!(a.url(), MISSING_ARTIFACT_URL);
        a.file_path = Some("clock.webp".into());
        assert_eq!(a.url(), "/render/clock.webp");
    }

    #[test]
    fn important_flag_read_from_metadata() {
        let mut a = row(None, None);
        assert!(!a.is_important());
        a.metadata = serde_json::json!({ "important": true });
        assert!(a.is_important());
    }

    #[test]
    fn window_admits_pending_fresh_and_upcoming() {
        let w = window();
        assert!(w.admits(&row(None, None)));
        assert!(w.admits(&row(None, Some(w.now - Duration::seconds(30)))));
        assert!(w.admits(&row(Some(w.now + Duration::seconds(12)), None)));
    }

    #[test]
    fn window_rejects_stale_and_past() {
        let w = window();
        assert!(!w.admits(&row(None, Some(w.now - Duration::minutes(2)))));
        assert!(!w.admits(&row(Some(w.now - Duration::seconds(12)), None)));
        assert!(!w.admits(&row(Some(w.now), None)));
        assert!(!w.admits(&row(Some(w.now + Duration::hours(1)), None)));
    }
}
