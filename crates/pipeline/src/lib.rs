//! Content generation and playback selection.
//!
//! Generation: [`orchestrator::GenerationOrchestrator`] takes the
//! single-flight lock, asks [`planner::SegmentPlanner`] which slots need
//! content and has [`generator::SegmentGenerator`] render and persist them.
//! Playback: [`selector::PlaybackSelector`] picks what a polling display
//! shows next. The two sides only meet in the store.

pub mod config;
pub mod encode;
pub mod error;
pub mod generator;
pub mod now_playing;
pub mod orchestrator;
pub mod planner;
pub mod render;
pub mod retention;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;
