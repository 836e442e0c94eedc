//! Generation lock row and lease.

use marquee_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Name of the lock guarding generation passes.
pub const GENERATE_LOCK: &str = "generate";

/// A row from the `generation_locks` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct GenerationLock {
    pub name: String,
    pub acquired: bool,
    pub token: Option<Uuid>,
    pub acquired_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
}

impl GenerationLock {
    /// Held by someone whose lease has not run out.
    pub fn is_held(&self, now: Timestamp) -> bool {
        self.acquired && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Proof of holding a lock; only the holder's token can release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub name: String,
    pub token: Uuid,
}

/// Outcome of a non-blocking acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttempt {
    Acquired(LockLease),
    /// The flag is set and its lease is live.
    AlreadyRunning,
    /// Another transaction holds the row lock right now.
    Contended,
}
