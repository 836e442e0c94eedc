//! Domain logic for the Marquee display scheduler.
//!
//! This crate has zero internal dependencies so the slot grid, the playback
//! priority cascade and the countdown math can be shared by the database
//! layer, the generation pipeline and the HTTP server alike.

pub mod alignment;
pub mod countdown;
pub mod error;
pub mod playback;
pub mod source;
pub mod types;
