//! Periodic retention sweep.
//!
//! Deletes animation rows and render files older than the configured
//! retention period, on a fixed interval using `tokio::time::interval`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marquee_db::Store;
use marquee_pipeline::retention;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the retention loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn Store>,
    render_dir: PathBuf,
    keep_for: chrono::Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_hours = keep_for.num_hours(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Retention job started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - keep_for;
                match retention::sweep(store.as_ref(), &render_dir, cutoff).await {
                    Ok(report) if report.rows > 0 || report.files > 0 => {
                        tracing::info!(rows = report.rows, files = report.files, "Retention: purged old content");
                    }
                    Ok(_) => tracing::debug!("Retention: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Retention: sweep failed"),
                }
            }
        }
    }
}
