//! In-process store.
//!
//! Mirrors the PostgreSQL schema's invariants (partial slot uniqueness,
//! forward-only `served_at`, lease-based locks) so the pipeline and the HTTP
//! server can run without a database: local development with `STORE=memory`
//! and the test suites.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use marquee_core::alignment::TimeAligner;
use marquee_core::source::AnimationSource;
use marquee_core::types::{DbId, Timestamp};
use uuid::Uuid;

use crate::models::animation::{Animation, CandidateWindow, CreateAnimation};
use crate::models::lock::{GenerationLock, LockAttempt, LockLease};
use crate::models::timer::Timer;
use crate::store::{check_aligned, duplicate, AnimationStore, LockStore, StoreError, TimerStore};

#[derive(Debug, Default)]
struct Inner {
    next_id: DbId,
    animations: Vec<Animation>,
    locks: HashMap<String, GenerationLock>,
    timers: Vec<Timer>,
}

impl Inner {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Store backed by a mutex-guarded `Vec`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    aligner: TimeAligner,
}

impl MemoryStore {
    /// A store on the default slot grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store checking scheduled inserts against `aligner`.
    pub fn with_aligner(aligner: TimeAligner) -> Self {
        Self {
            aligner,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the guard leaves the data consistent: every
        // mutation below is a single push or field write.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every animation row, in insertion order.
    pub fn animations(&self) -> Vec<Animation> {
        self.lock().animations.clone()
    }

    /// Snapshot of a lock row.
    pub fn lock_row(&self, name: &str) -> Option<GenerationLock> {
        self.lock().locks.get(name).cloned()
    }

    /// Insert an animation with an explicit creation time and serve state.
    ///
    /// Fixture writer: like a raw SQL insert it enforces slot uniqueness but
    /// skips the slot-grid check done by `create_animation`.
    pub fn insert_raw(
        &self,
        input: CreateAnimation,
        created_at: Timestamp,
        served_at: Option<Timestamp>,
    ) -> Result<Animation, StoreError> {
        let mut inner = self.lock();
        if let Some(start_time) = input.start_time {
            let taken = inner
                .animations
                .iter()
                .any(|a| a.start_time == Some(start_time) && a.source == input.source);
            if taken {
                return Err(duplicate(&input));
            }
        }
        let animation = Animation {
            id: inner.next_id(),
            created_at,
            file_path: input.file_path,
            start_time: input.start_time,
            served_at,
            source: input.source,
            metadata: input.metadata,
        };
        inner.animations.push(animation.clone());
        Ok(animation)
    }

    /// Insert a timer with an explicit creation time.
    pub fn insert_timer(&self, minutes: i32, created_at: Timestamp) -> Timer {
        let mut inner = self.lock();
        let timer = Timer {
            id: inner.next_id(),
            created_at,
            minutes,
            canceled: false,
        };
        inner.timers.push(timer.clone());
        timer
    }

    /// Force a lock row into the acquired state, as a crashed or concurrent
    /// holder would leave it.
    pub fn set_lock_acquired(&self, name: &str, expires_at: Option<Timestamp>) {
        let mut inner = self.lock();
        inner.locks.insert(
            name.to_string(),
            GenerationLock {
                name: name.to_string(),
                acquired: true,
                token: Some(Uuid::new_v4()),
                acquired_at: Some(Utc::now()),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl AnimationStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_animation(&self, input: &CreateAnimation) -> Result<Animation, StoreError> {
        check_aligned(&self.aligner, input)?;
        self.insert_raw(input.clone(), Utc::now(), None)
    }

    async fn max_start_time(
        &self,
        from: Timestamp,
        sources: &[AnimationSource],
    ) -> Result<Option<Timestamp>, StoreError> {
        Ok(self
            .lock()
            .animations
            .iter()
            .filter(|a| sources.contains(&a.source))
            .filter_map(|a| a.start_time)
            .filter(|t| *t >= from)
            .max())
    }

    async fn latest_by_source(
        &self,
        source: AnimationSource,
    ) -> Result<Option<Animation>, StoreError> {
        Ok(self
            .lock()
            .animations
            .iter()
            .filter(|a| a.source == source)
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn candidates(&self, window: &CandidateWindow) -> Result<Vec<Animation>, StoreError> {
        let mut pool: Vec<Animation> = self
            .lock()
            .animations
            .iter()
            .filter(|a| window.admits(a))
            .cloned()
            .collect();
        // Same order as the SQL query: unserved first, NULL start first.
        pool.sort_by_key(|a| {
            (
                a.served_at.is_some(),
                a.start_time.is_some(),
                a.start_time,
                a.created_at,
                a.id,
            )
        });
        Ok(pool)
    }

    async fn mark_served(&self, id: DbId, at: Timestamp) -> Result<Option<Animation>, StoreError> {
        let mut inner = self.lock();
        let Some(animation) = inner.animations.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        let servable = match animation.served_at {
            None => true,
            Some(prev) => prev < at && !animation.source.is_one_shot(),
        };
        if !servable {
            return Ok(None);
        }
        animation.served_at = Some(at);
        Ok(Some(animation.clone()))
    }

    async fn served_since(&self, since: Timestamp) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .animations
            .iter()
            .any(|a| a.served_at.is_some_and(|t| t > since)))
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let before = inner.animations.len();
        inner.animations.retain(|a| a.created_at >= cutoff);
        Ok((before - inner.animations.len()) as u64)
    }

    async fn delete_upcoming(
        &self,
        source: AnimationSource,
        now: Timestamp,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let before = inner.animations.len();
        inner.animations.retain(|a| {
            !(a.source == source
                && a.served_at.is_none()
                && a.start_time.is_some_and(|t| t > now))
        });
        Ok((before - inner.animations.len()) as u64)
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn try_acquire_lock(&self, name: &str, ttl: Duration) -> Result<LockAttempt, StoreError> {
        let now = Utc::now();
        let mut inner = self.lock();
        let lock = inner
            .locks
            .entry(name.to_string())
            .or_insert_with(|| GenerationLock {
                name: name.to_string(),
                acquired: false,
                token: None,
                acquired_at: None,
                expires_at: None,
            });

        if lock.is_held(now) {
            return Ok(LockAttempt::AlreadyRunning);
        }

        let token = Uuid::new_v4();
        lock.acquired = true;
        lock.token = Some(token);
        lock.acquired_at = Some(now);
        lock.expires_at = Some(now + ttl);

        Ok(LockAttempt::Acquired(LockLease {
            name: name.to_string(),
            token,
        }))
    }

    async fn release_lock(&self, lease: &LockLease) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.locks.get_mut(&lease.name) {
            Some(lock) if lock.token == Some(lease.token) => {
                lock.acquired = false;
                lock.token = None;
                lock.expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TimerStore for MemoryStore {
    async fn create_timer(&self, minutes: i32) -> Result<Timer, StoreError> {
        Ok(self.insert_timer(minutes, Utc::now()))
    }

    async fn active_timer(&self, now: Timestamp) -> Result<Option<Timer>, StoreError> {
        Ok(self
            .lock()
            .timers
            .iter()
            .filter(|t| t.is_active(now))
            .max_by_key(|t| (t.created_at, t.id))
            .cloned())
    }

    async fn cancel_timers(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let mut canceled = 0;
        for timer in inner.timers.iter_mut().filter(|t| t.is_active(now)) {
            timer.canceled = true;
            canceled += 1;
        }
        Ok(canceled)
    }
}
