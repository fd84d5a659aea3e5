//! Dense value-stream series

use crate::numeric;
use crate::types::{DataPoint, Timestamp};

/// A named series of evenly spaced values
///
/// `name` is the lookup identity, `alias` the display identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSeries {
    name: String,
    values: Vec<f64>,
    start: Timestamp,
    step: i64,
    alias: Option<String>,
}

impl ValueSeries {
    /// Create a new series without alias
    pub fn new(name: impl Into<String>, values: Vec<f64>, start: Timestamp, step: i64) -> Self {
        Self {
            name: name.into(),
            values,
            start,
            step,
            alias: None,
        }
    }

    /// Lookup name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name, falling back to the lookup name
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Replace the display name
    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    /// Builder-style alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.set_alias(alias);
        self
    }

    /// Values, NaN where missing
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp of the first value
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Timestamp of the last value, -1 when empty
    pub fn end(&self) -> Timestamp {
        if self.values.is_empty() {
            -1
        } else {
            self.start + self.step * (self.values.len() as i64 - 1)
        }
    }

    /// Step in seconds
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Lazily pair each value with its timestamp
    pub fn points(&self) -> impl Iterator<Item = DataPoint> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| DataPoint::new(self.start + self.step * i as i64, *v))
    }

    /// Apply `f` to every value, keeping the same time axis
    pub fn map_values(&self, name: impl Into<String>, f: impl Fn(f64) -> f64) -> ValueSeries {
        ValueSeries::new(
            name,
            self.values.iter().map(|v| f(*v)).collect(),
            self.start,
            self.step,
        )
    }

    /// Values averaged over groups of `factor` consecutive slots
    ///
    /// Used to bring a finer series to a coarser common step. A trailing
    /// partial group is averaged over what it holds.
    pub fn consolidated_values(&self, factor: usize) -> Vec<f64> {
        if factor <= 1 {
            return self.values.clone();
        }
        self.values.chunks(factor).map(numeric::avg).collect()
    }
}
