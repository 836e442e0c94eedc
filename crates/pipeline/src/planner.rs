//! Decides where the next timed segment starts.

use chrono::Duration;
use marquee_core::alignment::TimeAligner;
use marquee_core::source::AnimationSource;
use marquee_core::types::Timestamp;
use marquee_db::store::{AnimationStore, StoreError};

/// Outcome of planning one source group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPlan {
    /// Generate a segment beginning at this slot.
    Start(Timestamp),
    /// Content already reaches the horizon; nothing to do.
    Covered { through: Timestamp },
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentPlanner {
    aligner: TimeAligner,
    horizon: Duration,
}

impl SegmentPlanner {
    pub fn new(aligner: TimeAligner, horizon: Duration) -> Self {
        Self { aligner, horizon }
    }

    /// Plan the next segment for `sources`, looking only at slots at or after
    /// `now`.
    pub async fn plan<S: AnimationStore + ?Sized>(
        &self,
        store: &S,
        now: Timestamp,
        sources: &[AnimationSource],
    ) -> Result<SegmentPlan, StoreError> {
        let latest = store.max_start_time(now, sources).await?;
        Ok(self.plan_from(now, latest))
    }

    /// Plan from the latest upcoming slot already filled, if any.
    pub fn plan_from(&self, now: Timestamp, latest: Option<Timestamp>) -> SegmentPlan {
        let Some(latest) = latest else {
            return SegmentPlan::Start(self.aligner.align(now));
        };
        if latest >= now + self.horizon {
            return SegmentPlan::Covered { through: latest };
        }
        let next = self.aligner.next_time(latest);
        if next > latest {
            return SegmentPlan::Start(next);
        }
        let forced = self.aligner.align(latest + self.aligner.cadence().as_duration());
        tracing::warn!(
            latest = %latest,
            next = %next,
            forced = %forced,
            "Next slot did not advance; forcing one cadence ahead",
        );
        SegmentPlan::Start(forced)
    }
}
