//! Per-member value transforms: `alias`, `offset`, `scale`

use super::{format_number, Call};
use crate::error::Result;
use crate::series::SeriesSlice;

/// `alias(series, "name")`
pub fn alias(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, Some(2))?;
    let alias = call.string(1)?.to_string();
    let mut slice = call.series(0)?;
    for series in slice.iter_mut() {
        series.set_alias(alias.as_str());
    }
    Ok(slice)
}

/// `offset(series, n)`
pub fn offset(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, Some(2))?;
    let amount = call.number(1)?;
    let label = format_number(amount);
    let slice = call.series(0)?;
    Ok(slice
        .iter()
        .map(|s| s.map_values(format!("offset({},{label})", s.name()), |v| v + amount))
        .collect())
}

/// `scale(series, n)`
pub fn scale(mut call: Call<'_>) -> Result<SeriesSlice> {
    call.arity(2, Some(2))?;
    let factor = call.number(1)?;
    let label = format_number(factor);
    let slice = call.series(0)?;
    Ok(slice
        .iter()
        .map(|s| s.map_values(format!("scale({},{label})", s.name()), |v| v * factor))
        .collect())
}
