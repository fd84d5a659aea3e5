//! Property Tests for Series Algebra, Name Expansion and the Cold Codec
//!
//! Uses property-based testing (proptest) to check the invariants the
//! evaluator and the storage tiers rely on.

use chrono::{FixedOffset, TimeZone, Utc};
use kuba_graphite::{
    expand::{batches, expand_braces, expand_names},
    numeric,
    series::{PointSeries, SeriesMap, SeriesSlice, ValueSeries},
    storage::codec::{decode_points, encode_points},
    timeparser::parse_at_time,
    types::{DataPoint, DataPoints},
};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Values with a healthy share of NaN gaps
fn gappy_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => (-1e6..1e6f64),
        1 => Just(f64::NAN),
    ]
}

/// Unsorted points on a small timestamp domain, so duplicates are common
fn points() -> impl Strategy<Value = Vec<DataPoint>> {
    prop::collection::vec(
        (0i64..20, gappy_f64()).prop_map(|(t, v)| DataPoint::new(t * 10, v)),
        0..60,
    )
}

fn step() -> impl Strategy<Value = i64> {
    prop::sample::select(vec![1i64, 10, 20, 30, 60, 300])
}

fn series(name: &'static str) -> impl Strategy<Value = ValueSeries> {
    (prop::collection::vec(gappy_f64(), 0..40), 0i64..10, step()).prop_map(
        move |(values, start, step)| ValueSeries::new(name, values, start * step, step),
    )
}

/// Unsorted points anywhere on a wide, signed timestamp range
fn scattered_points() -> impl Strategy<Value = Vec<DataPoint>> {
    prop::collection::vec(
        (-100_000i64..100_000, gappy_f64()).prop_map(|(t, v)| DataPoint::new(t, v)),
        0..40,
    )
}

/// Maps drawn from a small name pool so both sides often share keys
fn series_map() -> impl Strategy<Value = SeriesMap> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b", "c", "d", "e"]),
        points(),
        0..5,
    )
    .prop_map(|members| {
        members
            .into_iter()
            .map(|(name, points)| PointSeries::new(name, points, 60))
            .collect()
    })
}

// =============================================================================
// Data Points
// =============================================================================

proptest! {
    #[test]
    fn prop_dedup_leaves_strictly_increasing_timestamps(input in points()) {
        let mut points = DataPoints::from(input);
        points.sort();
        points.deduplicate();
        for pair in points.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn prop_dedup_keeps_last_real_value(input in points()) {
        // expected winner per timestamp: the last non-NaN, else NaN
        let mut expected: HashMap<i64, f64> = HashMap::new();
        for p in &input {
            let entry = expected.entry(p.timestamp).or_insert(p.value);
            if !p.value.is_nan() {
                *entry = p.value;
            }
        }

        let mut points = DataPoints::from(input);
        points.sort();
        points.deduplicate();

        prop_assert_eq!(points.len(), expected.len());
        for p in points.iter() {
            let want = expected[&p.timestamp];
            if want.is_nan() {
                prop_assert!(p.value.is_nan());
            } else {
                prop_assert_eq!(p.value, want);
            }
        }
    }

    #[test]
    fn prop_codec_preserves_points(input in points()) {
        let blobs = encode_points(&input);
        prop_assert_eq!(blobs.len(), input.len());
        let decoded = decode_points(&blobs).unwrap();
        for (a, b) in input.iter().zip(&decoded) {
            prop_assert_eq!(a.timestamp, b.timestamp);
            prop_assert_eq!(a.value.to_bits(), b.value.to_bits());
        }
    }
}

// =============================================================================
// Series Algebra
// =============================================================================

proptest! {
    #[test]
    fn prop_normalize_step_is_common_multiple(a in series("a"), b in series("b"), c in series("c")) {
        let slice: SeriesSlice = vec![a, b, c].into();
        let axis = slice.normalize();
        for s in slice.iter() {
            prop_assert_eq!(axis.step % s.step(), 0);
            prop_assert!(axis.start <= s.start());
        }
        prop_assert_eq!(
            axis.step,
            numeric::lcm_all(slice.iter().map(|s| s.step()))
        );
    }

    #[test]
    fn prop_zip_stops_at_shortest_member(a in series("a"), b in series("b")) {
        let slice: SeriesSlice = vec![a, b].into();
        let common = slice.normalize().step;
        let shortest = slice
            .iter()
            .map(|s| s.consolidated_values((common / s.step()) as usize).len())
            .min()
            .unwrap_or(0);

        let rows: Vec<Vec<f64>> = slice.zip().collect();
        prop_assert_eq!(rows.len(), shortest);
        prop_assert!(rows.iter().all(|row| row.len() == 2));
        // zip is restartable
        prop_assert_eq!(slice.zip().count(), shortest);
    }

    #[test]
    fn prop_sum_ignores_nan(values in prop::collection::vec(gappy_f64(), 0..30)) {
        let real: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let total = numeric::sum(&values);
        if real.is_empty() {
            prop_assert!(total.is_nan());
        } else {
            let expected: f64 = real.iter().sum();
            prop_assert!((total - expected).abs() <= 1e-6 * expected.abs().max(1.0));
        }
    }
}

proptest! {
    #[test]
    fn prop_point_series_timestamps_share_the_start_phase(input in scattered_points(), step in step()) {
        let series = PointSeries::new("m", input, step);
        let start = series.start();
        for pair in series.points().windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for p in series.points().iter() {
            prop_assert_eq!((p.timestamp - start).rem_euclid(step), 0);
            prop_assert_eq!(p.timestamp.rem_euclid(step), 0);
        }
        if !series.is_empty() {
            prop_assert_eq!(
                series.values().len() as i64,
                (series.end() - start) / step + 1
            );
        }
    }

    #[test]
    fn prop_value_series_points_match_values(s in series("m")) {
        let points: Vec<DataPoint> = s.points().collect();
        prop_assert_eq!(points.len(), s.values().len());
        for (i, (p, v)) in points.iter().zip(s.values()).enumerate() {
            prop_assert_eq!(p.timestamp, s.start() + i as i64 * s.step());
            prop_assert_eq!(p.value.to_bits(), v.to_bits());
        }
        if let Some(last) = points.last() {
            prop_assert_eq!(last.timestamp, s.end());
        }
    }

    #[test]
    fn prop_merge_points_key_set_is_symmetric(left in series_map(), right in series_map()) {
        let union: BTreeSet<String> = left
            .names()
            .chain(right.names())
            .map(str::to_string)
            .collect();

        let forward = left.clone().merge_points_to_map(right.clone());
        let backward = right.merge_points_to_map(left);
        let forward_names: BTreeSet<String> = forward.names().map(str::to_string).collect();
        let backward_names: BTreeSet<String> = backward.names().map(str::to_string).collect();

        prop_assert_eq!(&forward_names, &union);
        prop_assert_eq!(&backward_names, &union);
        for name in &union {
            let f = forward.get(name).map(|s| s.points().iter().map(|p| p.timestamp).collect::<Vec<_>>());
            let b = backward.get(name).map(|s| s.points().iter().map(|p| p.timestamp).collect::<Vec<_>>());
            prop_assert_eq!(f, b);
        }
    }
}

// =============================================================================
// Time Parsing
// =============================================================================

proptest! {
    #[test]
    fn prop_relative_and_absolute_times_agree(now in 0i64..4_000_000_000, back in 0i64..1_000_000_000) {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now_at = Utc.timestamp_opt(now, 0).unwrap();

        let relative = parse_at_time(&format!("now-{back}s"), now_at, &utc).unwrap();
        prop_assert_eq!(relative, now - back);

        if relative >= 0 {
            let absolute = parse_at_time(&relative.to_string(), now_at, &utc).unwrap();
            prop_assert_eq!(absolute, relative);
        }
    }

    #[test]
    fn prop_clock_date_round_trips(minutes in 0i64..100_000_000, offset_hours in -12i32..=14) {
        let location = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        let ts = minutes * 60;
        let text = location
            .timestamp_opt(ts, 0)
            .unwrap()
            .format("%H:%M%Y%m%d")
            .to_string();
        let now_at = Utc.timestamp_opt(0, 0).unwrap();
        prop_assert_eq!(parse_at_time(&text, now_at, &location).unwrap(), ts);
    }
}

// =============================================================================
// Name Expansion
// =============================================================================

proptest! {
    #[test]
    fn prop_brace_expansion_is_cartesian(
        groups in prop::collection::vec(prop::collection::btree_set("[a-z]{1,3}", 1..4), 1..4)
    ) {
        let mut name = String::from("root");
        let mut expected = 1usize;
        for group in &groups {
            let alternatives: Vec<&str> = group.iter().map(String::as_str).collect();
            name.push_str(&format!(".{{{}}}", alternatives.join(",")));
            expected *= group.len();
        }

        let names = expand_braces(&name);
        prop_assert_eq!(names.len(), expected);
        prop_assert!(names.iter().all(|n| !n.contains('{') && n.starts_with("root.")), "expanded names must be brace-free and rooted at root.");
        prop_assert_eq!(expand_names(&name).len(), expected);
    }

    #[test]
    fn prop_batches_cover_names_in_order(count in 0usize..200, limit in 1usize..60) {
        let names: Vec<String> = (0..count).map(|i| format!("m.{i}")).collect();
        let groups = batches(names.clone(), limit);
        prop_assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= limit));
        prop_assert_eq!(groups.concat(), names);
    }
}
