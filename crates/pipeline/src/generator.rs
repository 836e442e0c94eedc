//! Renders segments into artifacts and persists them as animations.
//!
//! A timed segment is one continuous frame stream covering
//! `segment_window + animation_length`, cut into overlapping slices that start
//! every cadence step. Rendering and encoding run on the blocking pool.

use std::sync::Arc;

use chrono::{Duration, Utc};
use marquee_core::countdown;
use marquee_core::source::AnimationSource;
use marquee_core::types::Timestamp;
use marquee_db::models::animation::{Animation, CreateAnimation, META_IMPORTANT, META_ITEM_ID};
use marquee_db::models::timer::Timer;
use marquee_db::store::AnimationStore;
use serde_json::json;

use crate::config::GenerationConfig;
use crate::encode::{ArtifactEncoder, EncodeError};
use crate::error::GenerationError;
use crate::now_playing::ActiveItem;
use crate::render::{render_frames, RenderRequest, Renderers};

/// File name of the pre-rendered doorbell artifact inside the render dir.
pub const DOORBELL_ARTIFACT: &str = "doorbell.webp";

/// One slice to cut from a rendered frame stream.
#[derive(Debug, Clone)]
struct SlicePlan {
    start: Timestamp,
    /// Index of the slice's first frame in the stream.
    offset: usize,
    frames: usize,
    file_name: String,
    metadata: serde_json::Value,
}

/// What one timed segment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub source: AnimationSource,
    pub start: Timestamp,
    pub inserted: usize,
    /// Slots that were already filled by another writer.
    pub duplicates: usize,
    /// Slices skipped because encoding failed.
    pub failed: usize,
}

impl SegmentReport {
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "Generated {} {} animations from {}",
            self.inserted,
            self.source,
            self.start.format("%H:%M:%S")
        );
        if self.duplicates > 0 {
            line.push_str(&format!(", {} slots already filled", self.duplicates));
        }
        if self.failed > 0 {
            line.push_str(&format!(", {} slices failed to encode", self.failed));
        }
        line
    }
}

/// Result of the interrupt-class check.
#[derive(Debug, Clone, PartialEq)]
pub enum NowPlayingOutcome {
    /// The latest now-playing animation already shows this item.
    Unchanged,
    Created(Animation),
}

#[derive(Clone)]
pub struct SegmentGenerator {
    config: Arc<GenerationConfig>,
    renderers: Arc<dyn Renderers>,
    encoder: Arc<dyn ArtifactEncoder>,
}

impl SegmentGenerator {
    pub fn new(
        config: Arc<GenerationConfig>,
        renderers: Arc<dyn Renderers>,
        encoder: Arc<dyn ArtifactEncoder>,
    ) -> Self {
        Self {
            config,
            renderers,
            encoder,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The clock face used for the segment starting at `start`. Faces rotate
    /// once per segment window.
    pub fn clock_face_for(&self, start: Timestamp) -> AnimationSource {
        let faces = &self.config.clock_faces;
        let window = self.config.segment_window.num_seconds().max(1);
        let index = start.timestamp().div_euclid(window) as usize % faces.len().max(1);
        faces.get(index).copied().unwrap_or(AnimationSource::ClockRays)
    }

    /// Render and persist a clock segment beginning at `start`.
    pub async fn clock_segment<S: AnimationStore + ?Sized>(
        &self,
        store: &S,
        start: Timestamp,
    ) -> Result<SegmentReport, GenerationError> {
        let source = self.clock_face_for(start);
        let request = match source {
            AnimationSource::ClockRadar => RenderRequest::ClockRadar,
            _ => RenderRequest::ClockRays,
        };
        let frames = self.config.frames_per_animation();
        let slices = self
            .config
            .slice_offsets()
            .into_iter()
            .map(|offset| {
                let slot = start + offset;
                SlicePlan {
                    start: slot,
                    offset: self.config.frames_in(offset),
                    frames,
                    file_name: artifact_name(source, slot),
                    metadata: json!({ "expected_at": slot }),
                }
            })
            .collect();
        self.timed_segment(store, source, start, request, slices).await
    }

    /// Render and persist countdown slices for `timer` beginning at `start`.
    ///
    /// Slices stop at the timer's end; the last one is shortened to the time
    /// actually left.
    pub async fn countdown_segment<S: AnimationStore + ?Sized>(
        &self,
        store: &S,
        timer: &Timer,
        start: Timestamp,
    ) -> Result<SegmentReport, GenerationError> {
        let source = AnimationSource::CountdownTimer;
        let ends_at = timer.ends_at();
        let slices: Vec<SlicePlan> = self
            .config
            .slice_offsets()
            .into_iter()
            .map(|offset| (offset, start + offset))
            .take_while(|(_, slot)| *slot < ends_at)
            .map(|(offset, slot)| {
                let remaining = countdown::remaining(ends_at, slot);
                let length = countdown::slice_length(remaining, self.config.animation_length);
                SlicePlan {
                    start: slot,
                    offset: self.config.frames_in(offset),
                    frames: self.config.frames_in(length),
                    file_name: artifact_name(source, slot),
                    metadata: json!({
                        META_IMPORTANT: countdown::is_important(remaining),
                        "expected_at": slot,
                        "ends_at": ends_at,
                        "timer_id": timer.id,
                        "remaining": countdown::format_remaining(remaining),
                    }),
                }
            })
            .collect();
        let request = RenderRequest::Countdown {
            ends_at,
            total: Duration::minutes(i64::from(timer.minutes)),
        };
        self.timed_segment(store, source, start, request, slices).await
    }

    /// Render an ephemeral now-playing animation unless the latest one already
    /// shows `item`.
    pub async fn now_playing<S: AnimationStore + ?Sized>(
        &self,
        store: &S,
        item: &ActiveItem,
    ) -> Result<NowPlayingOutcome, GenerationError> {
        let latest = store.latest_by_source(AnimationSource::NowPlaying).await?;
        if latest.as_ref().and_then(|a| a.item_id()) == Some(item.id.as_str()) {
            return Ok(NowPlayingOutcome::Unchanged);
        }

        let file_name = format!("now-playing-{}.webp", sanitize(&item.id));
        self.render_single(RenderRequest::NowPlaying(item.clone()), &file_name).await?;

        let input = CreateAnimation::ephemeral(AnimationSource::NowPlaying, Some(file_name))
            .with_metadata(json!({
                META_ITEM_ID: item.id,
                "title": item.title,
                "artist": item.artist,
            }));
        let animation = store.create_animation(&input).await?;
        tracing::info!(
            animation_id = animation.id,
            item_id = %item.id,
            title = %item.title,
            "Now playing animation created",
        );
        Ok(NowPlayingOutcome::Created(animation))
    }

    /// Render the doorbell artifact if it is missing. Returns whether it was
    /// rendered.
    pub async fn ensure_doorbell_artifact(&self) -> Result<bool, GenerationError> {
        let path = self.config.render_dir.join(DOORBELL_ARTIFACT);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        self.render_single(RenderRequest::Doorbell, DOORBELL_ARTIFACT).await?;
        tracing::info!(path = %path.display(), "Doorbell artifact rendered");
        Ok(true)
    }

    /// Render one full-length animation to `file_name`.
    async fn render_single(
        &self,
        request: RenderRequest,
        file_name: &str,
    ) -> Result<(), GenerationError> {
        let renderers = Arc::clone(&self.renderers);
        let encoder = Arc::clone(&self.encoder);
        let config = Arc::clone(&self.config);
        let dest = config.render_dir.join(file_name);
        tokio::task::spawn_blocking(move || -> Result<(), GenerationError> {
            let mut frame_source = renderers.frame_source(&request)?;
            let frames = render_frames(
                frame_source.as_mut(),
                Utc::now(),
                config.frame_interval,
                config.frames_per_animation(),
                (config.width, config.height),
            )?;
            encoder.encode(&frames, config.frame_interval, &dest)?;
            Ok(())
        })
        .await
        .map_err(|e| GenerationError::Task(e.to_string()))?
    }

    async fn timed_segment<S: AnimationStore + ?Sized>(
        &self,
        store: &S,
        source: AnimationSource,
        start: Timestamp,
        request: RenderRequest,
        slices: Vec<SlicePlan>,
    ) -> Result<SegmentReport, GenerationError> {
        let renderers = Arc::clone(&self.renderers);
        let encoder = Arc::clone(&self.encoder);
        let config = Arc::clone(&self.config);

        let encoded = tokio::task::spawn_blocking(
            move || -> Result<Vec<(SlicePlan, Result<(), EncodeError>)>, GenerationError> {
                let total = slices.iter().map(|s| s.offset + s.frames).max().unwrap_or(0);
                if total == 0 {
                    return Ok(Vec::new());
                }
                let mut frame_source = renderers.frame_source(&request)?;
                let frames = render_frames(
                    frame_source.as_mut(),
                    start,
                    config.frame_interval,
                    total,
                    (config.width, config.height),
                )?;
                Ok(slices
                    .into_iter()
                    .map(|slice| {
                        let dest = config.render_dir.join(&slice.file_name);
                        let window = &frames[slice.offset..slice.offset + slice.frames];
                        let result = encoder.encode(window, config.frame_interval, &dest);
                        (slice, result)
                    })
                    .collect())
            },
        )
        .await
        .map_err(|e| GenerationError::Task(e.to_string()))??;

        let mut failed = 0;
        let mut inputs = Vec::with_capacity(encoded.len());
        for (slice, result) in encoded {
            match result {
                Ok(()) => inputs.push(
                    CreateAnimation::scheduled(source, slice.start, slice.file_name)
                        .with_metadata(slice.metadata),
                ),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        source = %source,
                        start_time = %slice.start,
                        error = %e,
                        "Slice failed to encode, skipping",
                    );
                }
            }
        }

        let report = store.create_animations(&inputs).await?;
        for duplicate in &report.duplicates {
            tracing::warn!(
                source = %source,
                start_time = ?duplicate.start_time,
                "Slot already filled, keeping the existing animation",
            );
        }

        let report = SegmentReport {
            source,
            start,
            inserted: report.inserted.len(),
            duplicates: report.duplicates.len(),
            failed,
        };
        tracing::info!(
            source = %source,
            start = %start,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            "Segment generated",
        );
        Ok(report)
    }
}

/// Artifact file name for a scheduled slice.
fn artifact_name(source: AnimationSource, slot: Timestamp) -> String {
    format!("{source}-{}.webp", slot.format("%Y%m%d-%H%M%S"))
}

/// Restrict an external identity to file-name-safe characters.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use marquee_db::memory::MemoryStore;

    use super::*;
    use crate::testing::{generator, generator_with, test_config, FailingEncoder, NthFailingEncoder};

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 11, h, m, s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Clock segments
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn clock_segment_fills_every_slot_in_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, encoder) = generator(dir.path());
        let store = MemoryStore::new();

        let report = generator.clock_segment(&store, at(12, 0, 0)).await.unwrap();

        assert_eq!(report.inserted, 8);
        assert_eq!(report.duplicates, 0);
        let rows = store.animations();
        let starts: Vec<_> = rows.iter().filter_map(|a| a.start_time).collect();
        assert_eq!(starts.first(), Some(&at(12, 0, 0)));
        assert_eq!(starts.last(), Some(&at(12, 1, 24)));
        assert!(starts.windows(2).all(|w| w[1] - w[0] == Duration::seconds(12)));
        assert!(encoder.frame_counts().iter().all(|&n| n == 150));
    }

    #[tokio::test]
    async fn repeated_segment_keeps_slots_unique() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let store = MemoryStore::new();

        generator.clock_segment(&store, at(12, 0, 0)).await.unwrap();
        let again = generator.clock_segment(&store, at(12, 0, 48)).await.unwrap();

        assert_eq!(again.duplicates, 4);
        assert_eq!(again.inserted, 4);
        let rows = store.animations();
        let slots: HashSet<_> = rows.iter().map(|a| (a.start_time, a.source)).collect();
        assert_eq!(slots.len(), rows.len());
    }

    #[tokio::test]
    async fn failed_slices_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator_with(dir.path(), Arc::new(NthFailingEncoder::new(2)));
        let store = MemoryStore::new();

        let report = generator.clock_segment(&store, at(12, 0, 0)).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.inserted, 7);
        assert!(report.status_line().contains("1 slices failed"));
    }

    #[test]
    fn faces_rotate_per_window() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let a = generator.clock_face_for(at(12, 0, 0));
        let b = generator.clock_face_for(at(12, 1, 30));
        assert_ne!(a, b);
        assert!(a.is_clock() && b.is_clock());
    }

    // -----------------------------------------------------------------------
    // Countdown
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn countdown_slices_stop_at_the_timer_end() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, encoder) = generator(dir.path());
        let store = MemoryStore::new();
        // Ends at 12:00:30.
        let timer = store.insert_timer(1, at(11, 59, 30));

        let report = generator
            .countdown_segment(&store, &timer, at(12, 0, 0))
            .await
            .unwrap();

        assert_eq!(report.inserted, 3);
        let rows = store.animations();
        assert!(rows.iter().all(|a| a.metadata[META_IMPORTANT] == json!(true)));
        assert_eq!(rows[2].start_time, Some(at(12, 0, 24)));
        assert_eq!(rows[2].metadata["remaining"], json!("00:06"));
        assert_eq!(encoder.frame_counts(), vec![150, 150, 60]);
    }

    #[tokio::test]
    async fn distant_countdown_is_not_important() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let store = MemoryStore::new();
        let timer = store.insert_timer(30, at(12, 0, 0));

        generator
            .countdown_segment(&store, &timer, at(12, 0, 0))
            .await
            .unwrap();

        assert!(store
            .animations()
            .iter()
            .all(|a| a.metadata[META_IMPORTANT] == json!(false)));
    }

    // -----------------------------------------------------------------------
    // Interrupt and doorbell
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn now_playing_renders_once_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        let store = MemoryStore::new();
        let song = ActiveItem::new("track/1", "Song", "Band");

        let first = generator.now_playing(&store, &song).await.unwrap();
        let second = generator.now_playing(&store, &song).await.unwrap();

        let NowPlayingOutcome::Created(animation) = first else {
            panic!("expected a new animation");
        };
        assert_eq!(animation.start_time, None);
        assert_eq!(animation.item_id(), Some("track/1"));
        assert_eq!(animation.file_path.as_deref(), Some("now-playing-track_1.webp"));
        assert_eq!(second, NowPlayingOutcome::Unchanged);

        let next = ActiveItem::new("track-2", "Other", "Band");
        assert!(matches!(
            generator.now_playing(&store, &next).await.unwrap(),
            NowPlayingOutcome::Created(_)
        ));
    }

    #[tokio::test]
    async fn now_playing_encode_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator_with(dir.path(), Arc::new(FailingEncoder));
        let store = MemoryStore::new();

        let err = generator
            .now_playing(&store, &ActiveItem::new("a", "b", "c"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Encode(_)));
        assert!(store.animations().is_empty());
    }

    #[tokio::test]
    async fn doorbell_artifact_rendered_only_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, encoder) = generator(dir.path());

        assert!(generator.ensure_doorbell_artifact().await.unwrap());
        assert!(!generator.ensure_doorbell_artifact().await.unwrap());
        assert_eq!(encoder.frame_counts().len(), 1);
        assert!(dir.path().join(DOORBELL_ARTIFACT).exists());
    }

    #[test]
    fn config_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, _) = generator(dir.path());
        assert_eq!(generator.config().render_dir, test_config(dir.path()).render_dir);
    }
}
