//! Store traits consumed by the generation pipeline and the playback path.
//!
//! [`PgStore`] delegates to the repositories; [`crate::memory::MemoryStore`]
//! keeps the same invariants in process memory.

use async_trait::async_trait;
use chrono::Duration;
use marquee_core::alignment::TimeAligner;
use marquee_core::source::AnimationSource;
use marquee_core::types::{DbId, Timestamp};

use crate::models::animation::{Animation, CandidateWindow, CreateAnimation};
use crate::models::lock::{LockAttempt, LockLease};
use crate::models::timer::Timer;
use crate::repositories::{AnimationRepo, GenerationLockRepo, TimerRepo};
use crate::DbPool;

/// Errors surfaced by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another row already claims this `(start_time, source)` slot.
    #[error("Slot {start_time} is already filled for {content}")]
    DuplicateSlot {
        content: AnimationSource,
        start_time: Timestamp,
    },

    /// A scheduled row whose start is off the slot grid.
    #[error("Start time {start_time} for {content} is not on a slot boundary")]
    Misaligned {
        content: AnimationSource,
        start_time: Timestamp,
    },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a bulk insert that tolerates slot collisions.
#[derive(Debug, Default)]
pub struct InsertReport {
    pub inserted: Vec<Animation>,
    /// Inputs skipped because their slot was already filled.
    pub duplicates: Vec<CreateAnimation>,
}

/// Animation persistence.
#[async_trait]
pub trait AnimationStore: Send + Sync {
    /// Verify the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Insert one animation. A filled slot yields [`StoreError::DuplicateSlot`];
    /// a start off the slot grid yields [`StoreError::Misaligned`].
    async fn create_animation(&self, input: &CreateAnimation) -> Result<Animation, StoreError>;

    /// Insert many animations, skipping filled slots.
    async fn create_animations(
        &self,
        inputs: &[CreateAnimation],
    ) -> Result<InsertReport, StoreError> {
        let mut report = InsertReport::default();
        for input in inputs {
            match self.create_animation(input).await {
                Ok(animation) => report.inserted.push(animation),
                Err(StoreError::DuplicateSlot { .. }) => report.duplicates.push(input.clone()),
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Latest `start_time >= from` among `sources`.
    async fn max_start_time(
        &self,
        from: Timestamp,
        sources: &[AnimationSource],
    ) -> Result<Option<Timestamp>, StoreError>;

    /// Most recently created animation of `source`.
    async fn latest_by_source(
        &self,
        source: AnimationSource,
    ) -> Result<Option<Animation>, StoreError>;

    /// Candidate pool, unserved first, then by slot (realtime first), then age.
    async fn candidates(&self, window: &CandidateWindow) -> Result<Vec<Animation>, StoreError>;

    /// Set `served_at = at`. `None` if the row cannot be served at `at`.
    async fn mark_served(&self, id: DbId, at: Timestamp) -> Result<Option<Animation>, StoreError>;

    /// Whether anything was served strictly after `since`.
    async fn served_since(&self, since: Timestamp) -> Result<bool, StoreError>;

    /// Delete animations created before `cutoff`.
    async fn delete_created_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Delete unserved rows of `source` scheduled after `now`.
    async fn delete_upcoming(
        &self,
        source: AnimationSource,
        now: Timestamp,
    ) -> Result<u64, StoreError>;
}

/// Named single-flight locks.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Non-blocking acquire with a lease of `ttl`.
    async fn try_acquire_lock(&self, name: &str, ttl: Duration) -> Result<LockAttempt, StoreError>;

    /// Release a lease. `false` if the lease was no longer current.
    async fn release_lock(&self, lease: &LockLease) -> Result<bool, StoreError>;
}

/// Countdown timers.
#[async_trait]
pub trait TimerStore: Send + Sync {
    async fn create_timer(&self, minutes: i32) -> Result<Timer, StoreError>;

    async fn active_timer(&self, now: Timestamp) -> Result<Option<Timer>, StoreError>;

    async fn cancel_timers(&self, now: Timestamp) -> Result<u64, StoreError>;
}

/// Everything the server needs from persistence.
pub trait Store: AnimationStore + LockStore + TimerStore {}

impl<T: AnimationStore + LockStore + TimerStore> Store for T {}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    aligner: TimeAligner,
}

impl PgStore {
    /// Scheduled inserts are checked against `aligner`'s slot grid.
    pub fn new(pool: DbPool, aligner: TimeAligner) -> Self {
        Self { pool, aligner }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AnimationStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_animation(&self, input: &CreateAnimation) -> Result<Animation, StoreError> {
        check_aligned(&self.aligner, input)?;
        match AnimationRepo::create(&self.pool, input).await? {
            Some(animation) => Ok(animation),
            None => Err(duplicate(input)),
        }
    }

    async fn max_start_time(
        &self,
        from: Timestamp,
        sources: &[AnimationSource],
    ) -> Result<Option<Timestamp>, StoreError> {
        Ok(AnimationRepo::max_start_time(&self.pool, from, sources).await?)
    }

    async fn latest_by_source(
        &self,
        source: AnimationSource,
    ) -> Result<Option<Animation>, StoreError> {
        Ok(AnimationRepo::latest_by_source(&self.pool, source).await?)
    }

    async fn candidates(&self, window: &CandidateWindow) -> Result<Vec<Animation>, StoreError> {
        Ok(AnimationRepo::candidates(&self.pool, window).await?)
    }

    async fn mark_served(&self, id: DbId, at: Timestamp) -> Result<Option<Animation>, StoreError> {
        Ok(AnimationRepo::mark_served(&self.pool, id, at).await?)
    }

    async fn served_since(&self, since: Timestamp) -> Result<bool, StoreError> {
        Ok(AnimationRepo::served_since(&self.pool, since).await?)
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(AnimationRepo::delete_created_before(&self.pool, cutoff).await?)
    }

    async fn delete_upcoming(
        &self,
        source: AnimationSource,
        now: Timestamp,
    ) -> Result<u64, StoreError> {
        Ok(AnimationRepo::delete_upcoming(&self.pool, source, now).await?)
    }
}

#[async_trait]
impl LockStore for PgStore {
    async fn try_acquire_lock(&self, name: &str, ttl: Duration) -> Result<LockAttempt, StoreError> {
        Ok(GenerationLockRepo::try_acquire(&self.pool, name, ttl).await?)
    }

    async fn release_lock(&self, lease: &LockLease) -> Result<bool, StoreError> {
        Ok(GenerationLockRepo::release(&self.pool, lease).await?)
    }
}

#[async_trait]
impl TimerStore for PgStore {
    async fn create_timer(&self, minutes: i32) -> Result<Timer, StoreError> {
        Ok(TimerRepo::create(&self.pool, minutes).await?)
    }

    async fn active_timer(&self, now: Timestamp) -> Result<Option<Timer>, StoreError> {
        Ok(TimerRepo::active(&self.pool, now).await?)
    }

    async fn cancel_timers(&self, now: Timestamp) -> Result<u64, StoreError> {
        Ok(TimerRepo::cancel_active(&self.pool, now).await?)
    }
}

/// Reject scheduled rows whose start is not a slot boundary.
pub(crate) fn check_aligned(
    aligner: &TimeAligner,
    input: &CreateAnimation,
) -> Result<(), StoreError> {
    match input.start_time {
        Some(start_time) if !aligner.is_aligned(start_time) => Err(StoreError::Misaligned {
            content: input.source,
            start_time,
        }),
        _ => Ok(()),
    }
}

pub(crate) fn duplicate(input: &CreateAnimation) -> StoreError {
    match input.start_time {
        Some(start_time) => StoreError::DuplicateSlot {
            content: input.source,
            start_time,
        },
        // Unscheduled rows cannot collide; a missing row here means the
        // insert was silently dropped.
        None => StoreError::Database(sqlx::Error::RowNotFound),
    }
}
