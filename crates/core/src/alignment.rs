//! Slot grid alignment.
//!
//! Scheduled content starts on a fixed cadence grid anchored to the wall-clock
//! minute: with a 12 second cadence the valid start seconds are
//! `{0, 12, 24, 36, 48}`, with 15 seconds `{0, 15, 30, 45}`. The cadence is a
//! value owned by whoever builds the [`TimeAligner`]; the planner and the
//! generator must be handed the same one.

use chrono::{Duration, Timelike};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default slot cadence in seconds.
pub const DEFAULT_CADENCE_SECS: u32 = 12;

/// A slot spacing that evenly divides one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCadence(u32);

impl SlotCadence {
    /// Build a cadence; it must be positive and divide 60.
    pub fn new(secs: u32) -> Result<Self, CoreError> {
        if secs == 0 || 60 % secs != 0 {
            return Err(CoreError::Validation(format!(
                "Slot cadence must divide 60 seconds, got {secs}"
            )));
        }
        Ok(Self(secs))
    }

    pub fn secs(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::seconds(i64::from(self.0))
    }

    /// Second-of-minute values that are valid slot starts.
    pub fn boundaries(self) -> Vec<u32> {
        (0..60).step_by(self.0 as usize).collect()
    }
}

impl Default for SlotCadence {
    fn default() -> Self {
        Self(DEFAULT_CADENCE_SECS)
    }
}

/// Maps timestamps onto the slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeAligner {
    cadence: SlotCadence,
}

impl TimeAligner {
    pub fn new(cadence: SlotCadence) -> Self {
        Self { cadence }
    }

    pub fn cadence(&self) -> SlotCadence {
        self.cadence
    }

    /// Smallest boundary `b >= t`, with the sub-second part zeroed.
    ///
    /// Because the cadence divides 60 and Unix time has no leap seconds, the
    /// grid is anchored to the epoch and rolls over minutes on its own.
    pub fn align(&self, t: Timestamp) -> Timestamp {
        let step = i64::from(self.cadence.secs());
        let nanos = i64::from(t.nanosecond());
        let whole = t - Duration::nanoseconds(nanos);
        let rem = whole.timestamp().rem_euclid(step);

        if rem == 0 && nanos == 0 {
            whole
        } else {
            whole + Duration::seconds(step - rem)
        }
    }

    /// The boundary strictly after `align(t)`.
    pub fn next_time(&self, t: Timestamp) -> Timestamp {
        self.align(t) + self.cadence.as_duration()
    }

    /// Whether `t` already sits on a boundary.
    pub fn is_aligned(&self, t: Timestamp) -> bool {
        t.nanosecond() == 0 && t.timestamp().rem_euclid(i64::from(self.cadence.secs())) == 0
    }
}
