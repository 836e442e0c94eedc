//! Countdown timer entity.

use chrono::Duration;
use marquee_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `timers` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Timer {
    pub id: DbId,
    pub created_at: Timestamp,
    pub minutes: i32,
    pub canceled: bool,
}

impl Timer {
    pub fn ends_at(&self) -> Timestamp {
        self.created_at + Duration::minutes(i64::from(self.minutes))
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.canceled && self.ends_at() > now
    }
}

/// DTO for `POST /api/v1/timers`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimer {
    pub minutes: i32,
}
