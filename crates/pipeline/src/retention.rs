//! Retention sweep: drops old animation rows and their render files.

use std::path::Path;
use std::time::SystemTime;

use marquee_core::types::Timestamp;
use marquee_db::store::AnimationStore;

use crate::error::GenerationError;
use crate::generator::DOORBELL_ARTIFACT;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rows: u64,
    pub files: u64,
}

impl SweepReport {
    pub fn status_text(&self) -> String {
        format!(
            "Deleted {} animations and {} render files",
            self.rows, self.files
        )
    }
}

/// Delete rows created before `cutoff` and render files last modified before
/// it. A missing render directory counts as empty.
///
/// The doorbell artifact is rendered once and reused by every ring, so it is
/// never swept.
pub async fn sweep<S: AnimationStore + ?Sized>(
    store: &S,
    render_dir: &Path,
    cutoff: Timestamp,
) -> Result<SweepReport, GenerationError> {
    let rows = store.delete_created_before(cutoff).await?;
    let files = delete_files_before(render_dir, cutoff.into()).await?;
    tracing::info!(rows, files, cutoff = %cutoff, "Retention sweep complete");
    Ok(SweepReport { rows, files })
}

async fn delete_files_before(dir: &Path, cutoff: SystemTime) -> Result<u64, GenerationError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut deleted = 0;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() || entry.file_name() == DOORBELL_ARTIFACT {
            continue;
        }
        if metadata.modified()? >= cutoff {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(
                path = %entry.path().display(),
                error = %e,
                "Failed to delete render file",
            ),
        }
    }
    Ok(deleted)
}
