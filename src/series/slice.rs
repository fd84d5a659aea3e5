//! Ordered series lists produced by the evaluator

use super::value::ValueSeries;
use crate::numeric;
use crate::types::Timestamp;
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

/// Common time axis of a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Normalized {
    /// Earliest member start
    pub start: Timestamp,
    /// Latest member end
    pub end: Timestamp,
    /// Least common multiple of member steps
    pub step: i64,
}

/// Ordered list of value series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSlice(Vec<ValueSeries>);

impl SeriesSlice {
    /// Empty slice
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Common `(start, end, step)`; `(0, 0, 0)` for an empty slice
    pub fn normalize(&self) -> Normalized {
        if self.0.is_empty() {
            return Normalized::default();
        }
        Normalized {
            start: self.0.iter().map(|s| s.start()).min().unwrap_or(0),
            end: self.0.iter().map(|s| s.end()).max().unwrap_or(0),
            step: numeric::lcm_all(self.0.iter().map(|s| s.step()).filter(|s| *s > 0)),
        }
    }

    /// Row-wise view over the members
    ///
    /// Members finer than the common step are consolidated first. Each call
    /// returns a fresh iterator starting at row zero.
    pub fn zip(&self) -> Zip {
        let common = self.normalize().step;
        let columns: Vec<Vec<f64>> = self
            .0
            .iter()
            .map(|s| {
                let factor = if s.step() > 0 && common > s.step() {
                    (common / s.step()) as usize
                } else {
                    1
                };
                s.consolidated_values(factor)
            })
            .collect();
        let rows = if columns.is_empty() {
            0
        } else {
            columns.iter().map(Vec::len).min().unwrap_or(0)
        };
        Zip {
            columns,
            rows,
            cursor: 0,
        }
    }

    /// Unique member names, sorted, joined with `,`
    pub fn formatted_name(&self) -> String {
        let names: BTreeSet<&str> = self.0.iter().map(|s| s.name()).collect();
        names.into_iter().collect::<Vec<_>>().join(",")
    }

    /// Consume into the member list
    pub fn into_inner(self) -> Vec<ValueSeries> {
        self.0
    }
}

impl From<Vec<ValueSeries>> for SeriesSlice {
    fn from(series: Vec<ValueSeries>) -> Self {
        Self(series)
    }
}

impl FromIterator<ValueSeries> for SeriesSlice {
    fn from_iter<I: IntoIterator<Item = ValueSeries>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for SeriesSlice {
    type Target = Vec<ValueSeries>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SeriesSlice {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for SeriesSlice {
    type Item = ValueSeries;
    type IntoIter = std::vec::IntoIter<ValueSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Iterator over zipped rows; ends at the shortest member
#[derive(Debug, Clone)]
pub struct Zip {
    columns: Vec<Vec<f64>>,
    rows: usize,
    cursor: usize,
}

impl Zip {
    /// Number of rows this iterator yields in total
    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl Iterator for Zip {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.rows {
            return None;
        }
        let i = self.cursor;
        self.cursor += 1;
        Some(self.columns.iter().map(|c| c[i]).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.rows - self.cursor;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Zip {}
