//! Stubs shared by the pipeline unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;

use crate::config::GenerationConfig;
use crate::encode::{ArtifactEncoder, EncodeError};
use crate::generator::SegmentGenerator;
use crate::now_playing::{ActiveItem, NowPlayingProbe, ProbeError};
use crate::render::{BuiltinRenderers, Frame};

pub(crate) fn test_config(render_dir: &Path) -> GenerationConfig {
    GenerationConfig {
        render_dir: render_dir.to_path_buf(),
        ..GenerationConfig::default()
    }
}

/// Writes an empty file per artifact and records frame counts.
#[derive(Debug, Default)]
pub(crate) struct RecordingEncoder {
    counts: Mutex<Vec<usize>>,
}

impl RecordingEncoder {
    pub(crate) fn frame_counts(&self) -> Vec<usize> {
        self.counts.lock().unwrap().clone()
    }
}

impl ArtifactEncoder for RecordingEncoder {
    fn encode(&self, frames: &[Frame], _: Duration, dest: &Path) -> Result<(), EncodeError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, b"")?;
        self.counts.lock().unwrap().push(frames.len());
        Ok(())
    }
}

pub(crate) struct FailingEncoder;

impl ArtifactEncoder for FailingEncoder {
    fn encode(&self, _: &[Frame], _: Duration, _: &Path) -> Result<(), EncodeError> {
        Err(EncodeError::ExecutionFailed {
            exit_code: Some(1),
            stderr: "boom".into(),
        })
    }
}

/// Fails only the `n`th call (1-based).
pub(crate) struct NthFailingEncoder {
    n: usize,
    calls: AtomicUsize,
}

impl NthFailingEncoder {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            n,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ArtifactEncoder for NthFailingEncoder {
    fn encode(&self, frames: &[Frame], interval: Duration, dest: &Path) -> Result<(), EncodeError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.n {
            return FailingEncoder.encode(frames, interval, dest);
        }
        RecordingEncoder::default().encode(frames, interval, dest)
    }
}

pub(crate) fn generator_with(
    render_dir: &Path,
    encoder: Arc<dyn ArtifactEncoder>,
) -> SegmentGenerator {
    let config = test_config(render_dir);
    let renderers = Arc::new(BuiltinRenderers::new(config.width, config.height));
    SegmentGenerator::new(Arc::new(config), renderers, encoder)
}

pub(crate) fn generator(render_dir: &Path) -> (SegmentGenerator, Arc<RecordingEncoder>) {
    let encoder = Arc::new(RecordingEncoder::default());
    (generator_with(render_dir, encoder.clone()), encoder)
}

/// Probe returning a fixed answer.
pub(crate) struct FixedProbe(pub Option<ActiveItem>);

#[async_trait]
impl NowPlayingProbe for FixedProbe {
    async fn active_item(&self) -> Result<Option<ActiveItem>, ProbeError> {
        Ok(self.0.clone())
    }
}

pub(crate) struct FailingProbe;

#[async_trait]
impl NowPlayingProbe for FailingProbe {
    async fn active_item(&self) -> Result<Option<ActiveItem>, ProbeError> {
        Err(ProbeError::Status(401))
    }
}

pub(crate) struct PanickingProbe;

#[async_trait]
impl NowPlayingProbe for PanickingProbe {
    async fn active_item(&self) -> Result<Option<ActiveItem>, ProbeError> {
        panic!("probe exploded");
    }
}
