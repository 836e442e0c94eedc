//! Artifact encoding: frames in, looping animated WebP out.
//!
//! Encoders are synchronous and CPU/subprocess bound; callers run them on the
//! blocking pool.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Duration;
use image::ImageFormat;

use crate::render::Frame;

/// Error type for artifact encoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("No frames to encode")]
    Empty,

    #[error("webpmux binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("webpmux failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to write frame: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a frame sequence into a looping artifact at `dest`.
pub trait ArtifactEncoder: Send + Sync {
    fn encode(&self, frames: &[Frame], frame_interval: Duration, dest: &Path)
        -> Result<(), EncodeError>;
}

/// Writes each frame as a lossless WebP still and muxes them with `webpmux`.
#[derive(Debug, Clone)]
pub struct WebpMuxEncoder {
    binary: PathBuf,
}

impl Default for WebpMuxEncoder {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("webpmux"),
        }
    }
}

impl WebpMuxEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// `webpmux` arguments muxing `stills` into a looping animation at `dest`.
fn mux_args(stills: &[PathBuf], frame_interval: Duration, dest: &Path) -> Vec<String> {
    let delay = format!("+{}", frame_interval.num_milliseconds());
    let mut args = Vec::with_capacity(stills.len() * 3 + 4);
    for still in stills {
        args.push("-frame".to_string());
        args.push(still.to_string_lossy().into_owned());
        args.push(delay.clone());
    }
    args.extend(["-loop".to_string(), "0".to_string()]);
    args.extend(["-o".to_string(), dest.to_string_lossy().into_owned()]);
    args
}

impl ArtifactEncoder for WebpMuxEncoder {
    fn encode(
        &self,
        frames: &[Frame],
        frame_interval: Duration,
        dest: &Path,
    ) -> Result<(), EncodeError> {
        if frames.is_empty() {
            return Err(EncodeError::Empty);
        }
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        // Stills live next to the destination and vanish with `scratch`.
        let scratch = tempfile::tempdir_in(parent)?;

        let mut stills = Vec::with_capacity(frames.len());
        for (i, frame) in frames.iter().enumerate() {
            let path = scratch.path().join(format!("{i:05}.webp"));
            frame.save_with_format(&path, ImageFormat::WebP)?;
            stills.push(path);
        }

        let output = Command::new(&self.binary)
            .args(mux_args(&stills, frame_interval, dest))
            .output()
            .map_err(EncodeError::NotFound)?;

        if !output.status.success() {
            return Err(EncodeError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

/// Write a blank still to `dest` unless something is already there.
///
/// Used for the placeholder served when an animation has no artifact.
pub fn ensure_placeholder(dest: &Path, width: u32, height: u32) -> Result<bool, EncodeError> {
    if dest.exists() {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Frame::new(width, height).save_with_format(dest, ImageFormat::WebP)?;
    Ok(true)
}
