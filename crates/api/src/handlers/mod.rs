//! Request handlers, one module per resource.

pub mod cleanup;
pub mod doorbell;
pub mod generation;
pub mod playback;
pub mod timers;
