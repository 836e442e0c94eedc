//! Playback priority cascade.
//!
//! Choosing what the display shows next is an ordered list of comparison
//! stages. Each stage answers "a wins", "b wins" or "tie"; the next stage is
//! consulted only on a tie. The order of [`CASCADE`] is a product decision:
//! doorbell, then recency among served content, then realtime over scheduled,
//! then imminent important timers, then earliest start, then variety.

use std::cmp::Ordering;

use chrono::Duration;

use crate::source::AnimationSource;
use crate::types::Timestamp;

/// How close to its expected moment an important countdown must be to jump
/// the queue.
pub const IMMINENT_WINDOW_SECS: i64 = 15;

/// The view of an animation the cascade needs.
pub trait PlaybackCandidate {
    fn source(&self) -> AnimationSource;
    fn start_time(&self) -> Option<Timestamp>;
    fn served_at(&self) -> Option<Timestamp>;
    fn is_important(&self) -> bool;

    /// The moment this content is meant to be on screen.
    fn expected_at(&self) -> Option<Timestamp> {
        self.start_time()
    }

    fn is_served(&self) -> bool {
        self.served_at().is_some()
    }

    fn is_realtime(&self) -> bool {
        self.start_time().is_none()
    }
}

/// Context shared by every comparison in one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSummary {
    pub now: Timestamp,
    /// `served_at` of the most recently served countdown timer in the pool.
    pub last_timer: Option<Timestamp>,
    /// `served_at` of the most recently served clock face in the pool.
    pub last_clock: Option<Timestamp>,
}

impl SelectionSummary {
    pub fn from_candidates<C: PlaybackCandidate>(now: Timestamp, candidates: &[C]) -> Self {
        let latest_served = |pred: fn(AnimationSource) -> bool| {
            candidates
                .iter()
                .filter(|c| pred(c.source()))
                .filter_map(|c| c.served_at())
                .max()
        };

        Self {
            now,
            last_timer: latest_served(|s| s == AnimationSource::CountdownTimer),
            last_clock: latest_served(AnimationSource::is_clock),
        }
    }
}

/// One comparison stage of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Doorbell outranks everything else.
    Doorbell,
    /// Between two served candidates, the more recently served wins.
    ServedRecency,
    /// Unserved realtime content outranks unserved scheduled content.
    RealtimeFirst,
    /// Important countdowns close to their moment outrank the rest.
    ImportantImminent,
    /// Between two unserved scheduled candidates, the earlier start wins.
    EarliestStart,
    /// Prefer a content type that has not been on screen recently.
    Variety,
}

/// Stages in evaluation order.
pub const CASCADE: [Stage; 6] = [
    Stage::Doorbell,
    Stage::ServedRecency,
    Stage::RealtimeFirst,
    Stage::ImportantImminent,
    Stage::EarliestStart,
    Stage::Variety,
];

impl Stage {
    /// `Less` means `a` should be shown before `b`.
    pub fn compare<C: PlaybackCandidate>(self, a: &C, b: &C, summary: &SelectionSummary) -> Ordering {
        match self {
            Stage::Doorbell => prefer(
                a.source() == AnimationSource::Doorbell,
                b.source() == AnimationSource::Doorbell,
            ),
            Stage::ServedRecency => match (a.served_at(), b.served_at()) {
                (Some(sa), Some(sb)) => sb.cmp(&sa),
                _ => Ordering::Equal,
            },
            Stage::RealtimeFirst => {
                if a.is_served() || b.is_served() {
                    Ordering::Equal
                } else {
                    prefer(a.is_realtime(), b.is_realtime())
                }
            }
            Stage::ImportantImminent => prefer(
                is_important_and_imminent(a, summary.now),
                is_important_and_imminent(b, summary.now),
            ),
            Stage::EarliestStart => match (a.start_time(), b.start_time()) {
                (Some(sa), Some(sb)) if !a.is_served() && !b.is_served() => sa.cmp(&sb),
                _ => Ordering::Equal,
            },
            Stage::Variety => {
                let timer_first = if summary.last_timer.is_none() {
                    prefer(
                        is_fresh(a, |s| s == AnimationSource::CountdownTimer),
                        is_fresh(b, |s| s == AnimationSource::CountdownTimer),
                    )
                } else {
                    Ordering::Equal
                };
                timer_first.then_with(|| {
                    if summary.last_clock.is_none() {
                        prefer(
                            is_fresh(a, AnimationSource::is_clock),
                            is_fresh(b, AnimationSource::is_clock),
                        )
                    } else {
                        Ordering::Equal
                    }
                })
            }
        }
    }
}

/// Run the cascade, stopping at the first stage that is not a tie.
pub fn compare<C: PlaybackCandidate>(a: &C, b: &C, summary: &SelectionSummary) -> Ordering {
    CASCADE
        .iter()
        .fold(Ordering::Equal, |acc, stage| {
            acc.then_with(|| stage.compare(a, b, summary))
        })
}

/// Stable-sort `candidates` best first.
///
/// The cascade is not guaranteed to be transitive across mixed
/// served/unserved pools, so this uses insertion sort, which keeps equal
/// elements in input order and never rejects an inconsistent comparator.
pub fn rank<C: PlaybackCandidate>(candidates: &mut [C], summary: &SelectionSummary) {
    for i in 1..candidates.len() {
        let mut j = i;
        while j > 0 && compare(&candidates[j], &candidates[j - 1], summary) == Ordering::Less {
            candidates.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn prefer(a: bool, b: bool) -> Ordering {
    match (a, b) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn is_fresh<C: PlaybackCandidate>(c: &C, kind: fn(AnimationSource) -> bool) -> bool {
    !c.is_served() && kind(c.source())
}

fn is_important_and_imminent<C: PlaybackCandidate>(c: &C, now: Timestamp) -> bool {
    if c.source() != AnimationSource::CountdownTimer || !c.is_important() {
        return false;
    }
    match c.expected_at() {
        Some(at) => (at - now).abs() <= Duration::seconds(IMMINENT_WINDOW_SECS),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Fake {
        name: &'static str,
        source: AnimationSource,
        start_time: Option<Timestamp>,
        served_at: Option<Timestamp>,
        important: bool,
    }

    impl PlaybackCandidate for Fake {
        fn source(&self) -> AnimationSource {
            self.source
        }
        fn start_time(&self) -> Option<Timestamp> {
            self.start_time
        }
        fn served_at(&self) -> Option<Timestamp> {
            self.served_at
        }
        fn is_important(&self) -> bool {
            self.important
        }
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 11, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    fn fake(name: &'static str, source: AnimationSource) -> Fake {
        Fake {
            name,
            source,
            start_time: None,
            served_at: None,
            important: false,
        }
    }

    fn scheduled(name: &'static str, source: AnimationSource, offset: i64) -> Fake {
        Fake {
            start_time: Some(now() + secs(offset)),
            ..fake(name, source)
        }
    }

    fn served(mut f: Fake, ago: i64) -> Fake {
        f.served_at = Some(now() - secs(ago));
        f
    }

    fn summary_of(pool: &[Fake]) -> SelectionSummary {
        SelectionSummary::from_candidates(now(), pool)
    }

    fn best(mut pool: Vec<Fake>) -> &'static str {
        let summary = summary_of(&pool);
        rank(&mut pool, &summary);
        pool[0].name
    }

    // -- Individual stages --

    #[test]
    fn doorbell_beats_recently_served_static() {
        let bell = fake("bell", AnimationSource::Doorbell);
        let stat = served(fake("static", AnimationSource::Static), 10);
        let summary = summary_of(&[bell.clone(), stat.clone()]);
        assert_eq!(compare(&bell, &stat, &summary), Ordering::Less);
        assert_eq!(compare(&stat, &bell, &summary), Ordering::Greater);
    }

    #[test]
    fn more_recently_served_wins_among_served() {
        let recent = served(scheduled("recent", AnimationSource::ClockRays, -5), 10);
        let older = served(scheduled("older", AnimationSource::ClockRays, -30), 40);
        let summary = summary_of(&[recent.clone(), older.clone()]);
        assert_eq!(compare(&recent, &older, &summary), Ordering::Less);
    }

    #[test]
    fn unserved_realtime_beats_unserved_scheduled() {
        let live = fake("live", AnimationSource::NowPlaying);
        let clock = scheduled("clock", AnimationSource::ClockRays, 5);
        let summary = summary_of(&[live.clone(), clock.clone()]);
        assert_eq!(compare(&live, &clock, &summary), Ordering::Less);
    }

    #[test]
    fn earlier_start_wins_between_unserved_scheduled() {
        let soon = scheduled("soon", AnimationSource::ClockRays, 5);
        let later = scheduled("later", AnimationSource::ClockRays, 15);
        let summary = summary_of(&[soon.clone(), later.clone()]);
        assert_eq!(compare(&later, &soon, &summary), Ordering::Greater);
    }

    #[test]
    fn important_timer_due_soon_beats_plain_scheduled() {
        let timer = Fake {
            important: true,
            ..scheduled("timer", AnimationSource::CountdownTimer, 10)
        };
        let clock = scheduled("clock", AnimationSource::ClockRays, 5);
        let summary = summary_of(&[timer.clone(), clock.clone()]);
        assert_eq!(compare(&timer, &clock, &summary), Ordering::Less);
    }

    #[test]
    fn important_timer_far_away_is_not_boosted() {
        let timer = Fake {
            important: true,
            ..scheduled("timer", AnimationSource::CountdownTimer, 60)
        };
        let clock = scheduled("clock", AnimationSource::ClockRays, 5);
        let summary = summary_of(&[timer.clone(), clock.clone()]);
        assert_eq!(Stage::ImportantImminent.compare(&timer, &clock, &summary), Ordering::Equal);
        assert_eq!(compare(&timer, &clock, &summary), Ordering::Greater);
    }

    #[test]
    fn variety_prefers_timer_when_none_served() {
        let timer = scheduled("timer", AnimationSource::CountdownTimer, 12);
        let clock = scheduled("clock", AnimationSource::ClockRays, 12);
        let summary = summary_of(&[timer.clone(), clock.clone()]);
        assert_eq!(Stage::Variety.compare(&timer, &clock, &summary), Ordering::Less);
    }

    #[test]
    fn variety_prefers_clock_when_no_clock_served() {
        let clock = scheduled("clock", AnimationSource::ClockRadar, 12);
        let stat = scheduled("static", AnimationSource::Static, 12);
        let timer = served(scheduled("timer", AnimationSource::CountdownTimer, -12), 20);
        let summary = summary_of(&[clock.clone(), stat.clone(), timer]);
        assert_eq!(Stage::Variety.compare(&clock, &stat, &summary), Ordering::Less);
    }

    #[test]
    fn variety_is_neutral_once_both_kinds_were_served() {
        let timer = scheduled("timer", AnimationSource::CountdownTimer, 12);
        let clock = scheduled("clock", AnimationSource::ClockRays, 12);
        let pool = [
            timer.clone(),
            clock.clone(),
            served(scheduled("t0", AnimationSource::CountdownTimer, -12), 20),
            served(scheduled("c0", AnimationSource::ClockRays, -24), 30),
        ];
        let summary = summary_of(&pool);
        assert_eq!(Stage::Variety.compare(&timer, &clock, &summary), Ordering::Equal);
    }

    // -- Cascade ordering --

    #[test]
    fn doorbell_dominates_served_recency() {
        let bell = served(fake("bell", AnimationSource::Doorbell), 40);
        let clock = served(scheduled("clock", AnimationSource::ClockRays, -5), 5);
        let summary = summary_of(&[bell.clone(), clock.clone()]);
        assert_eq!(compare(&bell, &clock, &summary), Ordering::Less);
    }

    #[test]
    fn realtime_dominates_importance() {
        let live = fake("live", AnimationSource::NowPlaying);
        let timer = Fake {
            important: true,
            ..scheduled("timer", AnimationSource::CountdownTimer, 5)
        };
        let summary = summary_of(&[live.clone(), timer.clone()]);
        assert_eq!(compare(&live, &timer, &summary), Ordering::Less);
    }

    #[test]
    fn identical_candidates_tie() {
        let a = scheduled("a", AnimationSource::ClockRays, 12);
        let b = scheduled("b", AnimationSource::ClockRays, 12);
        let summary = summary_of(&[a.clone(), b.clone()]);
        assert_eq!(compare(&a, &b, &summary), Ordering::Equal);
    }

    // -- rank --

    #[test]
    fn rank_keeps_input_order_on_ties() {
        let pool = vec![
            scheduled("first", AnimationSource::ClockRays, 12),
            scheduled("second", AnimationSource::ClockRays, 12),
        ];
        assert_eq!(best(pool), "first");
    }

    #[test]
    fn rank_picks_doorbell_from_mixed_pool() {
        let pool = vec![
            served(scheduled("clock-0", AnimationSource::ClockRays, -5), 7),
            scheduled("clock-1", AnimationSource::ClockRays, 7),
            fake("live", AnimationSource::NowPlaying),
            fake("bell", AnimationSource::Doorbell),
        ];
        assert_eq!(best(pool), "bell");
    }

    #[test]
    fn rank_picks_earliest_upcoming_slot() {
        let pool = vec![
            scheduled("clock-2", AnimationSource::ClockRays, 31),
            scheduled("clock-1", AnimationSource::ClockRays, 7),
            scheduled("clock-3", AnimationSource::ClockRays, 55),
        ];
        assert_eq!(best(pool), "clock-1");
    }

    #[test]
    fn summary_tracks_latest_served_by_kind() {
        let pool = [
            served(scheduled("t", AnimationSource::CountdownTimer, -12), 20),
            served(scheduled("c1", AnimationSource::ClockRays, -24), 30),
            served(scheduled("c2", AnimationSource::ClockRadar, -12), 10),
        ];
        let summary = summary_of(&pool);
        assert_eq!(summary.last_timer, Some(now() - secs(20)));
        assert_eq!(summary.last_clock, Some(now() - secs(10)));
    }
}
