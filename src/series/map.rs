//! Name-keyed series collections built by the storage adapters

use super::point::PointSeries;
use super::slice::SeriesSlice;
use std::collections::BTreeMap;

/// Map of series name to point series
///
/// Backed by a `BTreeMap` so that conversion to a slice is name-ordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesMap(BTreeMap<String, PointSeries>);

impl SeriesMap {
    /// Empty map
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or replace a series under its own name
    pub fn insert(&mut self, series: PointSeries) {
        self.0.insert(series.name().to_string(), series);
    }

    /// Lookup by name
    pub fn get(&self, name: &str) -> Option<&PointSeries> {
        self.0.get(name)
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Series in name order
    pub fn iter(&self) -> impl Iterator<Item = &PointSeries> {
        self.0.values()
    }

    /// Whole-series union; `other` replaces entries with the same name
    pub fn merge(mut self, other: SeriesMap) -> SeriesMap {
        self.0.extend(other.0);
        self
    }

    /// Point-level union
    ///
    /// For names on both sides the points are concatenated (self first) and
    /// the series rebuilt, so on duplicate timestamps `other` wins unless its
    /// value is NaN. The rebuilt series keeps the step of `self`.
    pub fn merge_points_to_map(mut self, other: SeriesMap) -> SeriesMap {
        for (name, right) in other.0 {
            let merged = match self.0.remove(&name) {
                Some(left) => {
                    let step = left.step();
                    let mut points = left.into_points();
                    points.extend_from(right.points());
                    PointSeries::new(name.clone(), points, step)
                }
                None => right,
            };
            self.0.insert(name, merged);
        }
        self
    }

    /// Point-level union converted to a name-sorted slice of value series
    pub fn merge_points_to_slice(self, other: SeriesMap) -> SeriesSlice {
        self.merge_points_to_map(other)
            .0
            .into_values()
            .map(|s| s.to_value_series())
            .collect()
    }
}

impl FromIterator<PointSeries> for SeriesMap {
    fn from_iter<I: IntoIterator<Item = PointSeries>>(iter: I) -> Self {
        let mut map = SeriesMap::new();
        for series in iter {
            map.insert(series);
        }
        map
    }
}
