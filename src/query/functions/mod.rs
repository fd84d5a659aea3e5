//! Render function table
//!
//! Functions receive their arguments already evaluated: literals as they
//! were written, series expressions as a resolved [`SeriesSlice`]. Each
//! implementation validates its own arity and argument kinds through the
//! [`Call`] accessors, which report failures as `Error::Argument`.

mod aggregate;
mod regression;
mod summarize;
mod transform;

use super::eval::EvalContext;
use crate::error::{Error, Result};
use crate::numeric;
use crate::series::{SeriesSlice, ValueSeries};

// ============================================================================
// Arguments
// ============================================================================

/// An evaluated function argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Boolean literal
    Bool(bool),
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Resolved series expression
    Series {
        /// Formatted name of the slice
        name: String,
        /// Evaluated series
        slice: SeriesSlice,
    },
}

impl Arg {
    fn describe(&self) -> String {
        match self {
            Arg::Bool(b) => format!("boolean {b}"),
            Arg::Number(n) => format!("number {}", format_number(*n)),
            Arg::String(s) => format!("string {s:?}"),
            Arg::Series { name, .. } => format!("series {name}"),
        }
    }
}

/// One function invocation
pub struct Call<'a> {
    name: &'a str,
    args: Vec<Arg>,
    context: &'a EvalContext,
}

impl<'a> Call<'a> {
    /// Bundle a name, its evaluated arguments and the query context
    pub fn new(name: &'a str, args: Vec<Arg>, context: &'a EvalContext) -> Self {
        Self {
            name,
            args,
            context,
        }
    }

    /// Function name as invoked
    pub fn name(&self) -> &str {
        self.name
    }

    /// Query context
    pub fn context(&self) -> &'a EvalContext {
        self.context
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether the call has no arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Argument error for this function
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::argument(self.name, message)
    }

    /// Require `min..=max` arguments; `None` means unbounded
    pub fn arity(&self, min: usize, max: Option<usize>) -> Result<()> {
        let n = self.args.len();
        let ok = n >= min && max.map_or(true, |max| n <= max);
        if ok {
            return Ok(());
        }
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        Err(self.error(format!("expected {expected} arguments, got {n}")))
    }

    fn wrong_kind(&self, index: usize, expected: &str) -> Error {
        match self.args.get(index) {
            Some(arg) => self.error(format!(
                "argument {} must be {expected}, found {}",
                index + 1,
                arg.describe()
            )),
            None => self.error(format!("missing argument {}", index + 1)),
        }
    }

    /// Formatted name of the series argument at `index`
    pub fn series_name(&self, index: usize) -> Option<&str> {
        match self.args.get(index) {
            Some(Arg::Series { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Take the series at `index`, leaving an empty slice behind
    pub fn series(&mut self, index: usize) -> Result<SeriesSlice> {
        if let Some(Arg::Series { slice, .. }) = self.args.get_mut(index) {
            return Ok(std::mem::take(slice));
        }
        Err(self.wrong_kind(index, "a series"))
    }

    /// Concatenate every argument from `from` on; all must be series
    pub fn series_from(&mut self, from: usize) -> Result<SeriesSlice> {
        let mut out = SeriesSlice::new();
        for index in from..self.args.len() {
            out.extend(self.series(index)?);
        }
        Ok(out)
    }

    /// Numeric literal at `index`
    pub fn number(&self, index: usize) -> Result<f64> {
        match self.args.get(index) {
            Some(Arg::Number(n)) => Ok(*n),
            _ => Err(self.wrong_kind(index, "a number")),
        }
    }

    /// String literal at `index`
    pub fn string(&self, index: usize) -> Result<&str> {
        match self.args.get(index) {
            Some(Arg::String(s)) => Ok(s),
            _ => Err(self.wrong_kind(index, "a string")),
        }
    }

    /// String literal at `index`, if present
    pub fn optional_string(&self, index: usize) -> Result<Option<&str>> {
        if index >= self.args.len() {
            return Ok(None);
        }
        self.string(index).map(Some)
    }

    /// Boolean literal at `index`, if present
    pub fn optional_bool(&self, index: usize) -> Result<Option<bool>> {
        match self.args.get(index) {
            None => Ok(None),
            Some(Arg::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.wrong_kind(index, "a boolean")),
        }
    }
}

// ============================================================================
// Dispatch Table
// ============================================================================

/// Signature shared by every render function
pub type FunctionImpl = fn(Call<'_>) -> Result<SeriesSlice>;

const FUNCTIONS: &[(&str, FunctionImpl)] = &[
    ("alias", transform::alias),
    ("offset", transform::offset),
    ("scale", transform::scale),
    ("group", aggregate::group),
    ("sumSeries", aggregate::sum_series),
    ("averageSeries", aggregate::average_series),
    ("minSeries", aggregate::min_series),
    ("maxSeries", aggregate::max_series),
    ("multiplySeries", aggregate::multiply_series),
    ("divideSeries", aggregate::divide_series),
    ("percentileOfSeries", aggregate::percentile_of_series),
    ("sumSeriesWithWildcards", aggregate::sum_series_with_wildcards),
    ("summarize", summarize::summarize),
    ("linearRegression", regression::linear_regression),
];

/// Implementation for `name`
pub fn lookup(name: &str) -> Option<FunctionImpl> {
    FUNCTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
}

/// Whether `name` is in the table
pub fn is_function(name: &str) -> bool {
    lookup(name).is_some()
}

/// All known function names
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|(n, _)| *n)
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Reduce a slice row by row into one series named `label(formatted names)`
fn zip_reduce(label: &str, slice: &SeriesSlice, reducer: fn(&[f64]) -> f64) -> Option<ValueSeries> {
    if slice.is_empty() {
        return None;
    }
    let axis = slice.normalize();
    let values = slice.zip().map(|row| reducer(&row)).collect();
    Some(ValueSeries::new(
        format!("{label}({})", slice.formatted_name()),
        values,
        axis.start,
        axis.step,
    ))
}

/// Format a literal the way it appears in derived series names
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn reducer_for(name: &str) -> Option<fn(&[f64]) -> f64> {
    match name {
        "sum" | "total" => Some(numeric::sum),
        "avg" | "average" => Some(numeric::avg),
        "last" => Some(numeric::last),
        "max" => Some(numeric::max),
        "min" => Some(numeric::min),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn context() -> EvalContext {
        EvalContext::new(0, 86_400)
    }

    pub fn slice(members: &[(&str, &[f64], i64, i64)]) -> SeriesSlice {
        members
            .iter()
            .map(|(name, values, start, step)| ValueSeries::new(*name, values.to_vec(), *start, *step))
            .collect()
    }

    pub fn series_arg(slice: SeriesSlice) -> Arg {
        Arg::Series {
            name: slice.formatted_name(),
            slice,
        }
    }

    pub fn invoke(name: &str, args: Vec<Arg>) -> Result<SeriesSlice> {
        let context = context();
        let function = lookup(name).ok_or_else(|| Error::UnsupportedFunction(name.to_string()))?;
        function(Call::new(name, args, &context))
    }

    pub fn assert_values(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            if e.is_nan() {
                assert!(a.is_nan(), "{actual:?} vs {expected:?}");
            } else {
                assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
            }
        }
    }
}
