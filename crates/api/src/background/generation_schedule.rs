//! Internal generation trigger.
//!
//! Runs a generation pass on a fixed interval so no external cron is needed.
//! Passes still go through the generation lock, so an external trigger and
//! this loop never generate concurrently.

use std::time::Duration;

use marquee_pipeline::orchestrator::{GenerationOrchestrator, PassOutcome};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run passes every `period` until `cancel` is triggered.
pub async fn run(orchestrator: GenerationOrchestrator, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Generation scheduler started");

    let mut interval = tokio::time::interval(period);
    // A long pass should not trigger a burst of catch-up passes.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Generation scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                match orchestrator.run_pass().await {
                    Ok(PassOutcome::Completed(lines)) => {
                        tracing::debug!(steps = lines.len(), "Scheduled generation pass complete");
                    }
                    Ok(outcome) => {
                        tracing::debug!(status = %outcome.status_text(), "Scheduled generation pass skipped");
                    }
                    Err(e) => tracing::error!(error = %e, "Scheduled generation pass failed"),
                }
            }
        }
    }
}
