//! `linearRegression(series, startSourceAt=from, endSourceAt=until)`

use super::Call;
use crate::error::Result;
use crate::numeric;
use crate::series::{SeriesSlice, ValueSeries};
use crate::timeparser::parse_at_time;

/// Fit `y = a*x + b` over each member's points inside the source window and
/// emit the fitted line over the member's own span
///
/// A fit with fewer than two real points yields an all-NaN series.
pub fn linear_regression(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(1, Some(3))?;
    let context = call.context();
    let source_from = match call.optional_string(1)? {
        Some(s) => parse_at_time(s, context.now, &context.location)?,
        None => context.from,
    };
    let source_until = match call.optional_string(2)? {
        Some(s) => parse_at_time(s, context.now, &context.location)?,
        None => context.until,
    };
    let members = call.series(0)?;

    Ok(members
        .iter()
        .map(|series| {
            let window: Vec<f64> = series
                .points()
                .map(|p| {
                    if p.timestamp >= source_from && p.timestamp <= source_until {
                        p.value
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            let (factor, offset) = numeric::linear_regression(&window, series.start(), series.step());
            let values = (0..series.len())
                .map(|i| factor * (series.start() + series.step() * i as i64) as f64 + offset)
                .collect();
            ValueSeries::new(
                format!(
                    "linearRegression({}, {source_from}, {source_until})",
                    series.name()
                ),
                values,
                series.start(),
                series.step(),
            )
        })
        .collect())
}
