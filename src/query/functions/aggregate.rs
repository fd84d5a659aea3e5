//! Functions that combine members row by row

use super::{format_number, zip_reduce, Call};
use crate::error::Result;
use crate::numeric;
use crate::series::{SeriesSlice, ValueSeries};
use std::collections::{BTreeSet, HashMap};

/// `group(a, b, ...)`
pub fn group(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(1, None)?;
    call.series_from(0)
}

fn reduce_all(mut call: Call<'_>, label: &str, reducer: fn(&[f64]) -> f64) -> Result<SeriesSlice> {
    call.arity(1, None)?;
    let members = call.series_from(0)?;
    Ok(zip_reduce(label, &members, reducer).into_iter().collect())
}

/// `sumSeries(a, ...)`
pub fn sum_series(call: Call<'_>) -> Result<SeriesSlice> {
    reduce_all(call, "sumSeries", numeric::sum)
}

/// `averageSeries(a, ...)`
pub fn average_series(call: Call<'_>) -> Result<SeriesSlice> {
    reduce_all(call, "averageSeries", numeric::avg)
}

/// `minSeries(a, ...)`
pub fn min_series(call: Call<'_>) -> Result<SeriesSlice> {
    reduce_all(call, "minSeries", numeric::min)
}

/// `maxSeries(a, ...)`
pub fn max_series(call: Call<'_>) -> Result<SeriesSlice> {
    reduce_all(call, "maxSeries", numeric::max)
}

/// `multiplySeries(a, ...)`
pub fn multiply_series(call: Call<'_>) -> Result<SeriesSlice> {
    reduce_all(call, "multiplySeries", numeric::multiply)
}

/// `divideSeries(dividends, divisor)`
///
/// The divisor must resolve to exactly one series. Each dividend member
/// yields one output.
pub fn divide_series(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, Some(2))?;
    let divisor_name = call.series_name(1).unwrap_or_default().to_string();
    let divisor = call.series(1)?;
    if divisor.len() != 1 {
        return Err(call.error(format!(
            "divisor {divisor_name:?} must be a single series, got {}",
            divisor.len()
        )));
    }
    let dividends = call.series(0)?;
    let divisor = &divisor[0];

    Ok(dividends
        .iter()
        .map(|dividend| {
            let pair = SeriesSlice::from(vec![dividend.clone(), divisor.clone()]);
            let axis = pair.normalize();
            let values = pair.zip().map(|row| numeric::divide(row[0], row[1])).collect();
            ValueSeries::new(
                format!("divideSeries({},{})", dividend.name(), divisor.name()),
                values,
                axis.start,
                axis.step,
            )
        })
        .collect())
}

/// `percentileOfSeries(series, n, interpolate=false)`
pub fn percentile_of_series(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, Some(3))?;
    let n = call.number(1)?;
    if !(0.0..=100.0).contains(&n) {
        return Err(call.error(format!("percentile {n} is outside 0..100")));
    }
    let interpolate = call.optional_bool(2)?.unwrap_or(false);
    let members = call.series(0)?;
    if members.is_empty() {
        return Ok(SeriesSlice::new());
    }

    let axis = members.normalize();
    let values = members
        .zip()
        .map(|row| numeric::percentile(&row, n, interpolate))
        .collect();
    Ok(SeriesSlice::from(vec![ValueSeries::new(
        format!(
            "percentileOfSeries({},{})",
            members.formatted_name(),
            format_number(n)
        ),
        values,
        axis.start,
        axis.step,
    )]))
}

/// `sumSeriesWithWildcards(series, position, ...)`
///
/// Drops the 0-indexed dotted parts at the given positions, then sums the
/// members that share the stripped name. Output order is first occurrence.
pub fn sum_series_with_wildcards(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, None)?;
    let mut positions = BTreeSet::new();
    for index in 1..call.len() {
        let position = call.number(index)?;
        if position < 0.0 || position.fract() != 0.0 {
            return Err(call.error(format!("position {position} is not a non-negative integer")));
        }
        positions.insert(position as usize);
    }
    let members = call.series(0)?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ValueSeries>> = HashMap::new();
    for series in members {
        let stripped = series
            .name()
            .split('.')
            .enumerate()
            .filter(|(i, _)| !positions.contains(i))
            .map(|(_, part)| part)
            .collect::<Vec<_>>()
            .join(".");
        groups
            .entry(stripped.clone())
            .or_insert_with(|| {
                order.push(stripped);
                Vec::new()
            })
            .push(series);
    }

    Ok(order
        .into_iter()
        .filter_map(|name| {
            let group = SeriesSlice::from(groups.remove(&name)?);
            let axis = group.normalize();
            let values = group.zip().map(|row| numeric::sum(&row)).collect();
            Some(ValueSeries::new(name, values, axis.start, axis.step))
        })
        .collect())
}
