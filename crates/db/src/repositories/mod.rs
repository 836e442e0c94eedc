//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod animation_repo;
pub mod generation_lock_repo;
pub mod timer_repo;

pub use animation_repo::AnimationRepo;
pub use generation_lock_repo::GenerationLockRepo;
pub use timer_repo::TimerRepo;
