//! One generation pass, serialized by the `generate` lock.
//!
//! A pass runs in its own task holding a [`LeaseGuard`]. The guard releases
//! the lock when the pass finishes, fails or panics; the lock TTL covers a
//! crashed process.

use std::sync::Arc;

use chrono::Utc;
use marquee_core::source::AnimationSource;
use marquee_core::types::Timestamp;
use marquee_db::models::lock::{LockAttempt, LockLease, GENERATE_LOCK};
use marquee_db::store::{AnimationStore, LockStore, Store, TimerStore};

use crate::error::GenerationError;
use crate::generator::{NowPlayingOutcome, SegmentGenerator};
use crate::now_playing::NowPlayingProbe;
use crate::planner::{SegmentPlan, SegmentPlanner};

/// How a generation request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran; one status line per step.
    Completed(Vec<String>),
    /// Nothing has polled recently, so nothing was generated.
    NotRunning,
    /// Another pass holds the lock.
    AlreadyRunning,
    /// The lock row itself was momentarily locked by another transaction.
    Contended,
}

impl PassOutcome {
    /// Human-readable summary.
    pub fn status_text(&self) -> String {
        match self {
            Self::Completed(lines) => lines.join("\n"),
            Self::NotRunning => "Not running".to_string(),
            Self::AlreadyRunning => "Generation already running".to_string(),
            Self::Contended => "Generation lock contended, try again".to_string(),
        }
    }
}

/// Releases a lease on drop unless released explicitly.
struct LeaseGuard {
    store: Arc<dyn Store>,
    lease: Option<LockLease>,
}

impl LeaseGuard {
    fn new(store: Arc<dyn Store>, lease: LockLease) -> Self {
        Self {
            store,
            lease: Some(lease),
        }
    }

    async fn release(mut self) {
        if let Some(lease) = self.lease.take() {
            release_lease(self.store.as_ref(), &lease).await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let store = Arc::clone(&self.store);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { release_lease(store.as_ref(), &lease).await });
            }
            Err(_) => tracing::error!(
                lock = %lease.name,
                "No runtime to release generation lock; it will expire",
            ),
        }
    }
}

async fn release_lease(store: &dyn Store, lease: &LockLease) {
    match store.release_lock(lease).await {
        Ok(true) => tracing::debug!(lock = %lease.name, "Generation lock released"),
        Ok(false) => tracing::warn!(
            lock = %lease.name,
            "Generation lock was reclaimed before release",
        ),
        Err(e) => tracing::error!(
            lock = %lease.name,
            error = %e,
            "Failed to release generation lock",
        ),
    }
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    store: Arc<dyn Store>,
    generator: SegmentGenerator,
    planner: SegmentPlanner,
    probe: Option<Arc<dyn NowPlayingProbe>>,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        generator: SegmentGenerator,
        probe: Option<Arc<dyn NowPlayingProbe>>,
    ) -> Self {
        let config = generator.config();
        let planner = SegmentPlanner::new(config.aligner(), config.segment_window);
        Self {
            store,
            generator,
            planner,
            probe,
        }
    }

    /// Run one pass if the lock is free.
    pub async fn run_pass(&self) -> Result<PassOutcome, GenerationError> {
        let ttl = self.generator.config().lock_ttl;
        let lease = match self.store.try_acquire_lock(GENERATE_LOCK, ttl).await? {
            LockAttempt::Acquired(lease) => lease,
            LockAttempt::AlreadyRunning => {
                tracing::info!("Generation already running, skipping pass");
                return Ok(PassOutcome::AlreadyRunning);
            }
            LockAttempt::Contended => {
                tracing::warn!("Generation lock row contended, skipping pass");
                return Ok(PassOutcome::Contended);
            }
        };

        let guard = LeaseGuard::new(Arc::clone(&self.store), lease);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let result = this.execute(Utc::now()).await;
            guard.release().await;
            result
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Generation pass aborted");
                Err(GenerationError::Panicked(e.to_string()))
            }
        }
    }

    async fn execute(&self, now: Timestamp) -> Result<PassOutcome, GenerationError> {
        let since = now - self.generator.config().dormancy_window;
        if !self.store.served_since(since).await? {
            tracing::info!("No recent polls, display is dormant");
            return Ok(PassOutcome::NotRunning);
        }

        let mut lines = Vec::new();
        let steps = [Step::NowPlaying, Step::Clock, Step::Countdown, Step::Doorbell];
        for step in steps {
            match self.run_step(step, now).await {
                Ok(line) => lines.push(line),
                Err(e) if e.is_fatal() => {
                    tracing::error!(step = step.label(), error = %e, "Generation pass failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(step = step.label(), error = %e, "Generation step failed");
                    lines.push(format!("{} failed: {e}", step.label()));
                }
            }
        }
        tracing::info!(steps = lines.len(), "Generation pass complete");
        Ok(PassOutcome::Completed(lines))
    }

    async fn run_step(&self, step: Step, now: Timestamp) -> Result<String, GenerationError> {
        let store = self.store.as_ref();
        match step {
            Step::NowPlaying => {
                let Some(probe) = &self.probe else {
                    return Ok("Now playing: probe disabled".to_string());
                };
                let Some(item) = probe.active_item().await? else {
                    return Ok("Now playing: nothing playing".to_string());
                };
                match self.generator.now_playing(store, &item).await? {
                    NowPlayingOutcome::Unchanged => {
                        Ok(format!("Now playing: {} unchanged", item.title))
                    }
                    NowPlayingOutcome::Created(_) => {
                        Ok(format!("Now playing: rendered {} by {}", item.title, item.artist))
                    }
                }
            }
            Step::Clock => {
                match self.planner.plan(store, now, &AnimationSource::CLOCKS).await? {
                    SegmentPlan::Covered { through } => Ok(format!(
                        "Clock: covered through {}",
                        through.format("%H:%M:%S")
                    )),
                    SegmentPlan::Start(start) => {
                        let report = self.generator.clock_segment(store, start).await?;
                        Ok(format!("Clock: {}", report.status_line()))
                    }
                }
            }
            Step::Countdown => {
                let Some(timer) = store.active_timer(now).await? else {
                    return Ok("Countdown: no active timer".to_string());
                };
                let sources = [AnimationSource::CountdownTimer];
                match self.planner.plan(store, now, &sources).await? {
                    SegmentPlan::Covered { through } => Ok(format!(
                        "Countdown: covered through {}",
                        through.format("%H:%M:%S")
                    )),
                    SegmentPlan::Start(start) if start >= timer.ends_at() => {
                        Ok("Countdown: timer ends before the next slot".to_string())
                    }
                    SegmentPlan::Start(start) => {
                        let report = self
                            .generator
                            .countdown_segment(store, &timer, start)
                            .await?;
                        Ok(format!("Countdown: {}", report.status_line()))
                    }
                }
            }
            Step::Doorbell => {
                if self.generator.ensure_doorbell_artifact().await? {
                    Ok("Doorbell: artifact rendered".to_string())
                } else {
                    Ok("Doorbell: artifact ready".to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    NowPlaying,
    Clock,
    Countdown,
    Doorbell,
}

impl Step {
    fn label(self) -> &'static str {
        match self {
            Self::NowPlaying => "Now playing",
            Self::Clock => "Clock",
            Self::Countdown => "Countdown",
            Self::Doorbell => "Doorbell",
        }
    }
}
