//! Core data types used throughout the front-end
//!
//! # Key Types
//!
//! - **`DataPoint`**: a single measurement (unix seconds + value, NaN = missing)
//! - **`DataPoints`**: an ordered sequence of points with sort/dedup/align
//! - **`Metric`**: a named batch of datapoints as accepted by the write endpoint
//!
//! # Example
//!
//! ```rust
//! use kuba_graphite::types::{DataPoint, DataPoints};
//!
//! let mut points = DataPoints::from(vec![
//!     DataPoint::new(125, 2.0),
//!     DataPoint::new(61, 1.0),
//!     DataPoint::new(120, f64::NAN),
//! ]);
//! points.sort();
//! points.align_to_step(60);
//! points.deduplicate();
//! assert_eq!(points.len(), 2);
//! assert_eq!(points[1], DataPoint::new(120, 2.0));
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Timestamp in unix seconds
pub type Timestamp = i64;

/// A single time-series measurement
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataPoint {
    /// Unix seconds
    pub timestamp: Timestamp,
    /// Value, NaN when missing
    pub value: f64,
}

impl DataPoint {
    /// Create a new data point
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Equality treats two NaN values as equal so that series built from
/// missing data compare as expected in tests and merges.
impl PartialEq for DataPoint {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && (self.value == other.value || (self.value.is_nan() && other.value.is_nan()))
    }
}

/// Floor `timestamp` to a multiple of `step`
///
/// Uses the Euclidean remainder so negative timestamps floor downwards too.
pub fn align_timestamp(timestamp: Timestamp, step: i64) -> Timestamp {
    if step <= 0 {
        return timestamp;
    }
    timestamp - timestamp.rem_euclid(step)
}

/// Ordered sequence of data points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPoints(Vec<DataPoint>);

impl DataPoints {
    /// Empty sequence
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Stable sort by timestamp ascending
    pub fn sort(&mut self) {
        self.0.sort_by_key(|p| p.timestamp);
    }

    /// Collapse points sharing a timestamp
    ///
    /// Later points win, except that a NaN never overwrites a real value.
    /// Expects the sequence to be sorted.
    pub fn deduplicate(&mut self) {
        let mut out: Vec<DataPoint> = Vec::with_capacity(self.0.len());
        for point in self.0.drain(..) {
            match out.last_mut() {
                Some(prev) if prev.timestamp == point.timestamp => {
                    if !point.value.is_nan() {
                        prev.value = point.value;
                    }
                }
                _ => out.push(point),
            }
        }
        self.0 = out;
    }

    /// Floor every timestamp to a multiple of `step`
    pub fn align_to_step(&mut self, step: i64) {
        for p in &mut self.0 {
            p.timestamp = align_timestamp(p.timestamp, step);
        }
    }

    /// Append every point of `other`
    pub fn extend_from(&mut self, other: &DataPoints) {
        self.0.extend_from_slice(&other.0);
    }

    /// Consume into the underlying vector
    pub fn into_inner(self) -> Vec<DataPoint> {
        self.0
    }
}

impl From<Vec<DataPoint>> for DataPoints {
    fn from(points: Vec<DataPoint>) -> Self {
        Self(points)
    }
}

impl FromIterator<DataPoint> for DataPoints {
    fn from_iter<I: IntoIterator<Item = DataPoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for DataPoints {
    type Target = Vec<DataPoint>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DataPoints {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for DataPoints {
    type Item = DataPoint;
    type IntoIter = std::vec::IntoIter<DataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A named batch of datapoints to insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Dotted metric name, e.g. `server1.cpu.user`
    pub name: String,
    /// Points in insertion order
    pub datapoints: Vec<DataPoint>,
}

impl Metric {
    /// Create a new metric
    pub fn new(name: impl Into<String>, datapoints: Vec<DataPoint>) -> Self {
        Self {
            name: name.into(),
            datapoints,
        }
    }
}
