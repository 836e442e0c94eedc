//! Content source tags.
//!
//! Every animation row records which generator produced it. The string forms
//! are what the `animations.source` column stores (guarded by a CHECK
//! constraint in the initial migration).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which content generator produced an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationSource {
    Static,
    ClockRays,
    ClockRadar,
    NowPlaying,
    CountdownTimer,
    Doorbell,
}

impl AnimationSource {
    /// All sources in declaration order.
    pub const ALL: [AnimationSource; 6] = [
        AnimationSource::Static,
        AnimationSource::ClockRays,
        AnimationSource::ClockRadar,
        AnimationSource::NowPlaying,
        AnimationSource::CountdownTimer,
        AnimationSource::Doorbell,
    ];

    /// Clock faces share one timeline: the planner treats them as a group.
    pub const CLOCKS: [AnimationSource; 2] =
        [AnimationSource::ClockRays, AnimationSource::ClockRadar];

    pub fn as_str(self) -> &'static str {
        match self {
            AnimationSource::Static => "static",
            AnimationSource::ClockRays => "clock-rays",
            AnimationSource::ClockRadar => "clock-radar",
            AnimationSource::NowPlaying => "now-playing",
            AnimationSource::CountdownTimer => "countdown-timer",
            AnimationSource::Doorbell => "doorbell",
        }
    }

    pub fn is_clock(self) -> bool {
        matches!(self, AnimationSource::ClockRays | AnimationSource::ClockRadar)
    }

    /// One-shot notifications are never served twice.
    pub fn is_one_shot(self) -> bool {
        matches!(
            self,
            AnimationSource::CountdownTimer | AnimationSource::Doorbell
        )
    }
}

impl fmt::Display for AnimationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimationSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown animation source '{s}'. Must be one of: {}",
                    AnimationSource::ALL
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl TryFrom<String> for AnimationSource {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
