//! Frame production.
//!
//! A [`FrameSource`] is a step function: each call to
//! [`FrameSource::next_frame`] yields the frame shown at the given instant,
//! advancing whatever private state the renderer keeps. The generator calls
//! it at a fixed frame interval and never inspects that state.

mod faces;

use chrono::Duration;
use image::RgbImage;
use marquee_core::types::Timestamp;

use crate::now_playing::ActiveItem;

pub use faces::{ClockPulse, CountdownBar, RadarSweep, SlidingDoor, TitleCard};

/// One display frame.
pub type Frame = RgbImage;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Renderer produced a {got_width}x{got_height} frame, expected {width}x{height}")]
    Dimensions {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("Cannot render {0}")]
    Unsupported(String),

    #[error("Render failed: {0}")]
    Failed(String),
}

/// Step-function renderer.
pub trait FrameSource: Send {
    /// Produce the frame for instant `at`.
    fn next_frame(&mut self, at: Timestamp) -> Result<Frame, RenderError>;
}

/// What to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    ClockRays,
    ClockRadar,
    Countdown { ends_at: Timestamp, total: Duration },
    NowPlaying(ActiveItem),
    Doorbell,
}

/// Builds a fresh [`FrameSource`] per request.
pub trait Renderers: Send + Sync {
    fn frame_source(&self, request: &RenderRequest) -> Result<Box<dyn FrameSource>, RenderError>;
}

/// The built-in pixel renderers.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRenderers {
    pub width: u32,
    pub height: u32,
}

impl BuiltinRenderers {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Renderers for BuiltinRenderers {
    fn frame_source(&self, request: &RenderRequest) -> Result<Box<dyn FrameSource>, RenderError> {
        let (w, h) = (self.width, self.height);
        let source: Box<dyn FrameSource> = match request {
            RenderRequest::ClockRays => Box::new(ClockPulse::new(w, h)),
            RenderRequest::ClockRadar => Box::new(RadarSweep::new(w, h)),
            RenderRequest::Countdown { ends_at, total } => {
                Box::new(CountdownBar::new(w, h, *ends_at, *total))
            }
            RenderRequest::NowPlaying(item) => Box::new(TitleCard::new(w, h, &item.id)),
            RenderRequest::Doorbell => Box::new(SlidingDoor::new(w, h)),
        };
        Ok(source)
    }
}

/// Drive `source` for `count` frames starting at `start`, checking each frame
/// has the expected size.
pub fn render_frames(
    source: &mut dyn FrameSource,
    start: Timestamp,
    interval: Duration,
    count: usize,
    (width, height): (u32, u32),
) -> Result<Vec<Frame>, RenderError> {
    let mut frames = Vec::with_capacity(count);
    let mut at = start;
    for _ in 0..count {
        let frame = source.next_frame(at)?;
        if frame.dimensions() != (width, height) {
            return Err(RenderError::Dimensions {
                width,
                height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        frames.push(frame);
        at += interval;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    struct Tiny;

    impl FrameSource for Tiny {
        fn next_frame(&mut self, _at: Timestamp) -> Result<Frame, RenderError> {
            Ok(Frame::new(2, 2))
        }
    }

    #[test]
    fn render_frames_rejects_wrong_size() {
        let start = Utc.with_ymd_and_hms(2024, 5, 11, 12, 0, 0).unwrap();
        let err = render_frames(&mut Tiny, start, Duration::milliseconds(100), 3, (64, 32))
            .unwrap_err();
        assert!(matches!(err, RenderError::Dimensions { got_width: 2, .. }));
    }

    #[test]
    fn builtin_renderers_produce_display_sized_frames() {
        let renderers = BuiltinRenderers::new(64, 32);
        let start = Utc.with_ymd_and_hms(2024, 5, 11, 12, 0, 0).unwrap();
        let requests = [
            RenderRequest::ClockRays,
            RenderRequest::ClockRadar,
            RenderRequest::Countdown {
                ends_at: start + Duration::minutes(3),
                total: Duration::minutes(5),
            },
            RenderRequest::NowPlaying(ActiveItem::new("track-1", "Song", "Band")),
            RenderRequest::Doorbell,
        ];
        for request in &requests {
            let mut source = renderers.frame_source(request).unwrap();
            let frames = render_frames(
                source.as_mut(),
                start,
                Duration::milliseconds(100),
                20,
                (64, 32),
            )
            .unwrap();
            assert_eq!(frames.len(), 20);
        }
    }
}
