//! Property tests for combiner and normalization invariants.
//!
//! Uses proptest to verify:
//! 1. Merge completeness: rows cover every day between the earliest and latest
//!    observation, and every cell is filled
//! 2. Fill direction: a gap holds the most recent earlier observation
//! 3. Observed values survive the merge unchanged
//! 4. Local-time normalization always yields a strictly increasing UTC index

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;
use std::collections::BTreeMap;

use marketpulse_core::data::{combine, normalize_local_index};
use marketpulse_core::domain::{Observation, Series};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// A sparse daily series: a set of day offsets in the first quarter with values.
fn arb_points() -> impl Strategy<Value = BTreeMap<i64, f64>> {
    prop::collection::btree_map(0i64..90, 1.0..10_000.0_f64, 1..40)
}

fn to_series(name: &str, points: &BTreeMap<i64, f64>) -> Series {
    Series::new(
        name,
        points
            .iter()
            .map(|(&off, &v)| Observation::at_date(base() + Duration::days(off), v))
            .collect(),
    )
    .unwrap()
}

// ── 1. Merge completeness ────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_covers_union_span_and_fills_every_cell(
        a in arb_points(),
        b in arb_points(),
        c in arb_points(),
    ) {
        let series = vec![to_series("A", &a), to_series("B", &b), to_series("C", &c)];
        let table = combine(&series).unwrap();

        let first = [&a, &b, &c].iter().map(|m| *m.keys().next().unwrap()).min().unwrap();
        let last = [&a, &b, &c].iter().map(|m| *m.keys().next_back().unwrap()).max().unwrap();

        prop_assert_eq!(table.height() as i64, last - first + 1);
        prop_assert_eq!(table.dates()[0], base() + Duration::days(first));
        prop_assert!(table.dates().windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
        prop_assert!(table.is_fully_populated());
    }
}

// ── 2. Fill direction ────────────────────────────────────────────────

proptest! {
    #[test]
    fn gaps_hold_most_recent_earlier_value(a in arb_points(), anchor in arb_points()) {
        let table = combine(&[to_series("A", &a), to_series("Anchor", &anchor)]).unwrap();
        let first_obs = *a.values().next().unwrap();

        for &date in table.dates() {
            let off = (date - base()).num_days();
            let expected = a
                .range(..=off)
                .next_back()
                .map(|(_, &v)| v)
                .unwrap_or(first_obs);
            prop_assert_eq!(table.get(date, "A"), Some(expected));
        }
    }
}

// ── 3. Observed values survive ───────────────────────────────────────

proptest! {
    #[test]
    fn observed_cells_are_untouched(a in arb_points(), b in arb_points()) {
        let table = combine(&[to_series("A", &a), to_series("B", &b)]).unwrap();
        for (&off, &v) in &a {
            prop_assert_eq!(table.get(base() + Duration::days(off), "A"), Some(v));
        }
        for (&off, &v) in &b {
            prop_assert_eq!(table.get(base() + Duration::days(off), "B"), Some(v));
        }
    }
}

// ── 4. Normalized index is monotonic ─────────────────────────────────

fn arb_local_times() -> impl Strategy<Value = Vec<(NaiveDateTime, f64)>> {
    // Hours across 2024, including both New York DST transitions.
    prop::collection::vec((0i64..366 * 24, 0.0..100.0_f64), 0..200).prop_map(|v| {
        v.into_iter()
            .map(|(h, val)| (base().and_time(NaiveTime::MIN) + Duration::hours(h), val))
            .collect()
    })
}

proptest! {
    #[test]
    fn normalized_index_is_strictly_increasing(points in arb_local_times()) {
        let n = points.len();
        let (obs, stats) = normalize_local_index(&chrono_tz::America::New_York, points);
        prop_assert!(obs.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        prop_assert_eq!(
            obs.len() + stats.dropped_ambiguous + stats.dropped_unresolvable + stats.dropped_duplicates,
            n
        );
        // Any output is a valid Series.
        prop_assert!(Series::new("norm", obs).is_ok());
    }
}
