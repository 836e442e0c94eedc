//! Repository for the `timers` table.

use marquee_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::timer::Timer;

/// Column list for `timers` queries.
const COLUMNS: &str = "id, created_at, minutes, canceled";

/// Provides CRUD operations for countdown timers.
pub struct TimerRepo;

impl TimerRepo {
    pub async fn create(pool: &PgPool, minutes: i32) -> Result<Timer, sqlx::Error> {
        let query = format!("INSERT INTO timers (minutes) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Timer>(&query)
            .bind(minutes)
            .fetch_one(pool)
            .await
    }

    /// Latest timer that is neither canceled nor expired at `now`.
    pub async fn active(pool: &PgPool, now: Timestamp) -> Result<Option<Timer>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM timers \
             WHERE NOT canceled \
               AND created_at + make_interval(mins => minutes) > $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Timer>(&query)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Cancel every timer still running at `now`. Returns the number canceled.
    pub async fn cancel_active(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE timers SET canceled = TRUE \
             WHERE NOT canceled \
               AND created_at + make_interval(mins => minutes) > $1",
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
