//! Timestamp-bucketed series

use super::value::ValueSeries;
use crate::types::{DataPoint, DataPoints, Timestamp};

/// A named series of points at a fixed step
///
/// Construction sorts, aligns to the step, then deduplicates. That order is
/// what guarantees a NaN can never shadow a real value that lands in the
/// same bucket after alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSeries {
    name: String,
    points: DataPoints,
    step: i64,
}

impl PointSeries {
    /// Build a series from unordered points
    pub fn new(name: impl Into<String>, points: impl Into<DataPoints>, step: i64) -> Self {
        let mut points = points.into();
        points.sort();
        points.align_to_step(step);
        points.deduplicate();
        Self {
            name: name.into(),
            points,
            step,
        }
    }

    /// Series name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sorted, aligned, deduplicated points
    pub fn points(&self) -> &DataPoints {
        &self.points
    }

    /// Step in seconds
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Number of stored points (not slots)
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First timestamp, -1 when empty
    pub fn start(&self) -> Timestamp {
        self.points.first().map_or(-1, |p| p.timestamp)
    }

    /// Last timestamp, -1 when empty
    pub fn end(&self) -> Timestamp {
        self.points.last().map_or(-1, |p| p.timestamp)
    }

    /// Dense values from `start` to `end`, NaN where no point exists
    pub fn values(&self) -> Vec<f64> {
        if self.points.is_empty() || self.step <= 0 {
            return Vec::new();
        }
        let start = self.start();
        let slots = ((self.end() - start) / self.step + 1) as usize;
        let mut values = vec![f64::NAN; slots];
        for DataPoint { timestamp, value } in self.points.iter() {
            let idx = ((timestamp - start) / self.step) as usize;
            values[idx] = *value;
        }
        values
    }

    /// Consume the series and hand back its points
    pub fn into_points(self) -> DataPoints {
        self.points
    }

    /// Convert to a dense value series
    pub fn to_value_series(&self) -> ValueSeries {
        let start = if self.is_empty() { 0 } else { self.start() };
        ValueSeries::new(self.name.clone(), self.values(), start, self.step)
    }
}
