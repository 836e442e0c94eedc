//! Generation and playback tuning, threaded into every pipeline component.

use std::path::PathBuf;

use chrono::Duration;
use marquee_core::alignment::{SlotCadence, TimeAligner};
use marquee_core::error::CoreError;
use marquee_core::source::AnimationSource;

/// Display width in pixels.
pub const DISPLAY_WIDTH: u32 = 64;

/// Display height in pixels.
pub const DISPLAY_HEIGHT: u32 = 32;

/// Timing, geometry and storage settings for generation and selection.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Slot spacing; also the step between consecutive slice starts.
    pub cadence: SlotCadence,
    /// Length of one pre-rendered animation.
    pub animation_length: Duration,
    /// How far ahead one generation pass covers; also the planner horizon.
    pub segment_window: Duration,
    pub frame_interval: Duration,
    pub width: u32,
    pub height: u32,
    /// Directory rendered artifacts are written to and served from.
    pub render_dir: PathBuf,
    /// Scheduled rows starting within this much of now are selectable.
    pub lookahead: Duration,
    /// Served rows stay in the candidate pool for this long.
    pub fresh_window: Duration,
    /// Generation is skipped unless something was served this recently.
    pub dormancy_window: Duration,
    pub lock_ttl: Duration,
    /// Clock faces rotated between segments.
    pub clock_faces: Vec<AnimationSource>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            cadence: SlotCadence::default(),
            animation_length: Duration::seconds(15),
            segment_window: Duration::seconds(90),
            frame_interval: Duration::milliseconds(100),
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
            render_dir: PathBuf::from("render"),
            lookahead: Duration::minutes(30),
            fresh_window: Duration::minutes(1),
            dormancy_window: Duration::minutes(1),
            lock_ttl: Duration::minutes(5),
            clock_faces: AnimationSource::CLOCKS.to_vec(),
        }
    }
}

impl GenerationConfig {
    /// Check the settings are mutually consistent.
    pub fn validate(&self) -> Result<(), CoreError> {
        let positive = [
            ("animation length", self.animation_length),
            ("segment window", self.segment_window),
            ("frame interval", self.frame_interval),
            ("lookahead", self.lookahead),
            ("lock TTL", self.lock_ttl),
        ];
        for (name, value) in positive {
            if value <= Duration::zero() {
                return Err(CoreError::Validation(format!("{name} must be positive")));
            }
        }
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::Validation(
                "Display dimensions must be non-zero".into(),
            ));
        }
        if self.animation_length < self.step() {
            return Err(CoreError::Validation(format!(
                "Animation length {}s is shorter than the {}s step; slices would leave gaps",
                self.animation_length.num_seconds(),
                self.cadence.secs()
            )));
        }
        if self.frames_in(self.step()) == 0 {
            return Err(CoreError::Validation(
                "Frame interval must be shorter than the slot cadence".into(),
            ));
        }
        if self.clock_faces.is_empty() || self.clock_faces.iter().any(|s| !s.is_clock()) {
            return Err(CoreError::Validation(
                "Clock faces must be a non-empty list of clock sources".into(),
            ));
        }
        Ok(())
    }

    pub fn aligner(&self) -> TimeAligner {
        TimeAligner::new(self.cadence)
    }

    /// Spacing between consecutive slice starts. Always the cadence, so every
    /// slice starts on a slot boundary.
    pub fn step(&self) -> Duration {
        self.cadence.as_duration()
    }

    /// Whole frames that fit in `span` (at least one for any positive span).
    pub fn frames_in(&self, span: Duration) -> usize {
        let interval = self.frame_interval.num_milliseconds();
        let span = span.num_milliseconds();
        if interval <= 0 || span <= 0 {
            return 0;
        }
        ((span + interval - 1) / interval) as usize
    }

    /// Frames in one full-length animation.
    pub fn frames_per_animation(&self) -> usize {
        self.frames_in(self.animation_length)
    }

    /// Slice start offsets within one segment window.
    pub fn slice_offsets(&self) -> Vec<Duration> {
        let step = self.step();
        let mut offsets = Vec::new();
        let mut offset = Duration::zero();
        while offset < self.segment_window {
            offsets.push(offset);
            offset += step;
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GenerationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.step(), Duration::seconds(12));
        assert_eq!(config.frames_per_animation(), 150);
    }

    #[test]
    fn slices_cover_the_window_at_the_cadence() {
        let config = GenerationConfig::default();
        let offsets = config.slice_offsets();
        assert_eq!(offsets.len(), 8);
        assert_eq!(offsets.last(), Some(&Duration::seconds(84)));
        assert!(offsets.iter().all(|o| o.num_seconds() % 12 == 0));
    }

    #[test]
    fn rejects_animation_shorter_than_step() {
        let config = GenerationConfig {
            animation_length: Duration::seconds(10),
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_clock_faces() {
        let config = GenerationConfig {
            clock_faces: vec![AnimationSource::Doorbell],
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_frames_round_up() {
        let config = GenerationConfig::default();
        assert_eq!(config.frames_in(Duration::milliseconds(250)), 3);
        assert_eq!(config.frames_in(Duration::zero()), 0);
    }
}
