//! Coercion of provider-local wall-clock timestamps onto a UTC index.
//!
//! Policy for DST edge cases:
//! - ambiguous local times (the repeated hour of a fall-back fold) are dropped
//! - non-existent local times (the skipped hour of a spring-forward gap) are
//!   shifted forward to the first local minute that exists
//!
//! The output is sorted and de-duplicated so later stages can assume a clean
//! monotonic index.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::Observation;

/// Longest gap we will step across when shifting a non-existent local time.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// How a single local timestamp resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact(DateTime<Utc>),
    Shifted(DateTime<Utc>),
    Ambiguous,
    Unresolvable,
}

/// Resolve one naive local timestamp in `tz`.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Resolution {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Resolution::Exact(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => Resolution::Ambiguous,
        LocalResult::None => {
            let mut probe = local;
            for _ in 0..MAX_GAP_MINUTES {
                probe += Duration::minutes(1);
                if let LocalResult::Single(dt) = tz.from_local_datetime(&probe) {
                    return Resolution::Shifted(dt.with_timezone(&Utc));
                }
            }
            Resolution::Unresolvable
        }
    }
}

/// Counts of what normalization did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub shifted: usize,
    pub dropped_ambiguous: usize,
    pub dropped_unresolvable: usize,
    pub dropped_duplicates: usize,
}

/// Convert `(local time, value)` pairs in `tz` into sorted, unique UTC observations.
///
/// Input order does not matter. When two inputs land on the same UTC instant
/// the later one in input order wins.
pub fn normalize_local_index(
    tz: &Tz,
    points: impl IntoIterator<Item = (NaiveDateTime, f64)>,
) -> (Vec<Observation>, NormalizeStats) {
    let mut stats = NormalizeStats::default();
    let mut out: Vec<Observation> = Vec::new();

    for (local, value) in points {
        match resolve_local(tz, local) {
            Resolution::Exact(ts) => out.push(Observation::new(ts, value)),
            Resolution::Shifted(ts) => {
                stats.shifted += 1;
                out.push(Observation::new(ts, value));
            }
            Resolution::Ambiguous => stats.dropped_ambiguous += 1,
            Resolution::Unresolvable => stats.dropped_unresolvable += 1,
        }
    }

    out.sort_by_key(|o| o.timestamp);
    let before = out.len();
    let mut deduped: Vec<Observation> = Vec::with_capacity(out.len());
    for o in out {
        match deduped.last_mut() {
            Some(last) if last.timestamp == o.timestamp => *last = o,
            _ => deduped.push(o),
        }
    }
    stats.dropped_duplicates = before - deduped.len();

    (deduped, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    const NY: Tz = chrono_tz::America::New_York;

    #[test]
    fn plain_time_converts_to_utc() {
        // EST is UTC-5 in January.
        let r = resolve_local(&NY, local(2024, 1, 15, 9, 30));
        assert_eq!(
            r,
            Resolution::Exact(Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap())
        );
    }

    #[test]
    fn spring_forward_gap_shifts_to_gap_end() {
        // 2024-03-10 02:30 does not exist in New York; clocks jump 02:00 -> 03:00 EDT.
        let r = resolve_local(&NY, local(2024, 3, 10, 2, 30));
        assert_eq!(
            r,
            Resolution::Shifted(Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn fall_back_fold_is_ambiguous() {
        // 2024-11-03 01:30 happens twice in New York.
        assert_eq!(
            resolve_local(&NY, local(2024, 11, 3, 1, 30)),
            Resolution::Ambiguous
        );
    }

    #[test]
    fn normalize_sorts_drops_and_shifts() {
        let input = vec![
            (local(2024, 11, 3, 1, 30), 3.0), // ambiguous, dropped
            (local(2024, 3, 10, 2, 30), 2.0), // gap, shifted
            (local(2024, 1, 1, 0, 0), 1.0),
        ];
        let (obs, stats) = normalize_local_index(&NY, input);

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value, 1.0);
        assert_eq!(obs[1].value, 2.0);
        assert!(obs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(stats.shifted, 1);
        assert_eq!(stats.dropped_ambiguous, 1);
    }

    #[test]
    fn colliding_instants_keep_the_later_input() {
        // 02:30 shifts to 03:00, colliding with an explicit 03:00 observation.
        let input = vec![
            (local(2024, 3, 10, 2, 30), 1.0),
            (local(2024, 3, 10, 3, 0), 2.0),
        ];
        let (obs, stats) = normalize_local_index(&NY, input);
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].value, 2.0);
        assert_eq!(stats.dropped_duplicates, 1);
    }

    #[test]
    fn utc_zone_is_identity() {
        let (obs, stats) = normalize_local_index(&Tz::UTC, vec![(local(2024, 5, 1, 0, 0), 4.0)]);
        assert_eq!(obs[0].timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(stats, NormalizeStats::default());
    }
}
