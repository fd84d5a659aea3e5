//! `summarize(series, interval, func="sum")`

use super::{reducer_for, Call};
use crate::error::Result;
use crate::series::{SeriesSlice, ValueSeries};
use crate::timeparser::parse_time_offset;
use crate::types::align_timestamp;
use std::collections::BTreeMap;

/// Most buckets one summarized member may produce
const MAX_BUCKETS: i128 = 1_000_000;

/// Rebucket each member into `interval`-wide buckets
///
/// Buckets run from the aligned first timestamp to the aligned end of the
/// series (`start + step * len`) inclusive. A bucket without real values
/// is NaN.
pub fn summarize(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, Some(3))?;
    let interval_text = call.string(1)?.to_string();
    let interval = parse_time_offset(&interval_text)?
        .checked_abs()
        .unwrap_or(i64::MAX);
    if interval == 0 {
        return Err(call.error("interval must be at least one second"));
    }
    let func = call.optional_string(2)?.unwrap_or("sum").to_string();
    let Some(reducer) = reducer_for(&func) else {
        return Err(call.error(format!("unknown aggregation {func:?}")));
    };
    let members = call.series(0)?;

    members
        .iter()
        .map(|series| {
            let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
            for point in series.points().filter(|p| !p.value.is_nan()) {
                buckets
                    .entry(align_timestamp(point.timestamp, interval))
                    .or_default()
                    .push(point.value);
            }

            let name = format!("summarize({},\"{interval_text}\",\"{func}\")", series.name());
            if series.is_empty() {
                return Ok(ValueSeries::new(name, Vec::new(), series.start(), interval));
            }

            let end = series.start() + series.step() * series.len() as i64;
            let first = align_timestamp(series.start(), interval);
            let last = align_timestamp(end, interval);
            let count = (i128::from(last) - i128::from(first)) / i128::from(interval) + 1;
            if count > MAX_BUCKETS {
                return Err(call.error(format!(
                    "interval {interval_text:?} splits {} into {count} buckets, at most {MAX_BUCKETS} are allowed",
                    series.name()
                )));
            }
            let values = (first..=last)
                .step_by(interval as usize)
                .map(|bucket| buckets.get(&bucket).map_or(f64::NAN, |v| reducer(v)))
                .collect();
            Ok(ValueSeries::new(name, values, first, interval))
        })
        .collect()
}
