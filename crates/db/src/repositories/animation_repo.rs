//! Repository for the `animations` table.
//!
//! Slot uniqueness is enforced by the partial index
//! `uq_animations_start_time_source`; inserts that lose a race for a slot
//! return `None` instead of failing.

use marquee_core::source::AnimationSource;
use marquee_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::animation::{Animation, CandidateWindow, CreateAnimation};

/// Column list for `animations` queries.
const COLUMNS: &str = "id, created_at, file_path, start_time, served_at, source, metadata";

/// Provides query operations for animations.
pub struct AnimationRepo;

impl AnimationRepo {
    /// Insert an animation.
    ///
    /// Returns `None` when a row already occupies `(start_time, source)`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateAnimation,
    ) -> Result<Option<Animation>, sqlx::Error> {
        let query = format!(
            "INSERT INTO animations (file_path, start_time, source, metadata) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (start_time, source) WHERE start_time IS NOT NULL DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Animation>(&query)
            .bind(&input.file_path)
            .bind(input.start_time)
            .bind(input.source.as_str())
            .bind(&input.metadata)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Animation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM animations WHERE id = $1");
        sqlx::query_as::<_, Animation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Latest scheduled slot at or after `from` among `sources`.
    pub async fn max_start_time(
        pool: &PgPool,
        from: Timestamp,
        sources: &[AnimationSource],
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        let names: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
        sqlx::query_scalar::<_, Option<Timestamp>>(
            "SELECT MAX(start_time) FROM animations \
             WHERE start_time >= $1 AND source = ANY($2)",
        )
        .bind(from)
        .bind(names)
        .fetch_one(pool)
        .await
    }

    /// Most recently created animation of a source.
    pub async fn latest_by_source(
        pool: &PgPool,
        source: AnimationSource,
    ) -> Result<Option<Animation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM animations \
             WHERE source = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Animation>(&query)
            .bind(source.as_str())
            .fetch_optional(pool)
            .await
    }

    /// The playback candidate pool, unserved rows first, then by slot.
    pub async fn candidates(
        pool: &PgPool,
        window: &CandidateWindow,
    ) -> Result<Vec<Animation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM animations \
             WHERE served_at >= $1 \
                OR (start_time IS NULL AND served_at IS NULL) \
                OR (start_time > $2 AND start_time <= $3) \
             ORDER BY (served_at IS NOT NULL) ASC, \
                      start_time ASC NULLS FIRST, \
                      created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Animation>(&query)
            .bind(window.served_since)
            .bind(window.now)
            .bind(window.lookahead_until)
            .fetch_all(pool)
            .await
    }

    /// Record that an animation went on screen at `at`.
    ///
    /// `served_at` only moves forward, and one-shot sources are never
    /// re-served. Returns `None` if the row is gone or not servable.
    pub async fn mark_served(
        pool: &PgPool,
        id: DbId,
        at: Timestamp,
    ) -> Result<Option<Animation>, sqlx::Error> {
        let one_shot: Vec<&str> = AnimationSource::ALL
            .into_iter()
            .filter(|s| s.is_one_shot())
            .map(|s| s.as_str())
            .collect();
        let query = format!(
            "UPDATE animations SET served_at = $2 \
             WHERE id = $1 \
               AND (served_at IS NULL \
                    OR (served_at < $2 AND source <> ALL($3))) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Animation>(&query)
            .bind(id)
            .bind(at)
            .bind(one_shot)
            .fetch_optional(pool)
            .await
    }

    /// Whether anything was served after `since` (the display is polling).
    pub async fn served_since(pool: &PgPool, since: Timestamp) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM animations WHERE served_at > $1)",
        )
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Delete rows created before `cutoff`. Returns the number removed.
    pub async fn delete_created_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM animations WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete unserved rows of `source` scheduled after `now`.
    pub async fn delete_upcoming(
        pool: &PgPool,
        source: AnimationSource,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM animations \
             WHERE source = $1 AND start_time > $2 AND served_at IS NULL",
        )
        .bind(source.as_str())
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
