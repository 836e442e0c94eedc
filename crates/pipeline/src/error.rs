use marquee_db::StoreError;

use crate::encode::EncodeError;
use crate::now_playing::ProbeError;
use crate::render::RenderError;

/// Failure of one generation step or of a whole pass.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking render task died.
    #[error("Render task failed: {0}")]
    Task(String),

    /// The pass itself panicked; the lock has been released.
    #[error("Generation pass panicked: {0}")]
    Panicked(String),
}

impl GenerationError {
    /// Whether the failure should end the pass rather than just the step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Panicked(_))
    }
}
