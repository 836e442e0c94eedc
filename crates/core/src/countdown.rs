//! Countdown timer math shared by the generator and the timer endpoints.

use chrono::Duration;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Countdown content within this many seconds of completion is flagged
/// important.
pub const IMPORTANT_WITHIN_SECS: i64 = 90;

/// Longest timer a user may start.
pub const MAX_TIMER_MINUTES: i32 = 720;

/// Validate a requested timer length.
pub fn validate_minutes(minutes: i32) -> Result<(), CoreError> {
    if (1..=MAX_TIMER_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Timer minutes must be between 1 and {MAX_TIMER_MINUTES}, got {minutes}"
        )))
    }
}

/// Time left on a timer ending at `ends_at`, clamped at zero.
pub fn remaining(ends_at: Timestamp, at: Timestamp) -> Duration {
    (ends_at - at).max(Duration::zero())
}

/// Whether a countdown with `remaining` left is close enough to completion
/// to boost its playback priority.
pub fn is_important(remaining: Duration) -> bool {
    remaining <= Duration::seconds(IMPORTANT_WITHIN_SECS)
}

/// Length of a countdown slice: the usual animation length, cut short when
/// the timer finishes sooner.
pub fn slice_length(remaining: Duration, animation_length: Duration) -> Duration {
    remaining.min(animation_length)
}

/// `MM:SS` label for the remaining time (minutes may exceed 59).
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}
