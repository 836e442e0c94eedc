//! Repository for the `generation_locks` table.
//!
//! Acquisition is non-blocking: the row is read with `FOR UPDATE NOWAIT`,
//! so a second concurrent acquirer gets [`LockAttempt::Contended`] instead
//! of queueing. Holding is a lease: a token plus an expiry, so a crashed
//! holder cannot lock generation out forever.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::lock::{GenerationLock, LockAttempt, LockLease};

/// Column list for `generation_locks` queries.
const COLUMNS: &str = "name, acquired, token, acquired_at, expires_at";

/// PostgreSQL `lock_not_available`, raised by `NOWAIT`.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Provides acquire/release for named generation locks.
pub struct GenerationLockRepo;

impl GenerationLockRepo {
    /// Create the lock row if it does not exist yet.
    pub async fn ensure(pool: &PgPool, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO generation_locks (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &PgPool, name: &str) -> Result<Option<GenerationLock>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_locks WHERE name = $1");
        sqlx::query_as::<_, GenerationLock>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Try to take the lock for `ttl`.
    pub async fn try_acquire(
        pool: &PgPool,
        name: &str,
        ttl: Duration,
    ) -> Result<LockAttempt, sqlx::Error> {
        Self::ensure(pool, name).await?;

        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM generation_locks WHERE name = $1 FOR UPDATE NOWAIT");
        let lock = match sqlx::query_as::<_, GenerationLock>(&query)
            .bind(name)
            .fetch_one(&mut *tx)
            .await
        {
            Ok(lock) => lock,
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) =>
            {
                return Ok(LockAttempt::Contended);
            }
            Err(e) => return Err(e),
        };

        if lock.is_held(Utc::now()) {
            tx.rollback().await?;
            return Ok(LockAttempt::AlreadyRunning);
        }

        if lock.acquired {
            tracing::warn!(
                lock = name,
                expired_at = ?lock.expires_at,
                "Reclaiming expired generation lock",
            );
        }

        let token = Uuid::new_v4();
        sqlx::query(
            "UPDATE generation_locks \
             SET acquired = TRUE, token = $2, acquired_at = NOW(), \
                 expires_at = NOW() + make_interval(secs => $3) \
             WHERE name = $1",
        )
        .bind(name)
        .bind(token)
        .bind(ttl.num_milliseconds() as f64 / 1000.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LockAttempt::Acquired(LockLease {
            name: name.to_string(),
            token,
        }))
    }

    /// Release a lease. Returns `false` if the token no longer holds the lock.
    pub async fn release(pool: &PgPool, lease: &LockLease) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_locks \
             SET acquired = FALSE, token = NULL, expires_at = NULL \
             WHERE name = $1 AND token = $2",
        )
        .bind(&lease.name)
        .bind(lease.token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
