//! Series model
//!
//! Two representations are used along the read path:
//!
//! ```text
//! storage adapters ──► SeriesMap { name → PointSeries }   (sparse, timestamped)
//!                          │ merge_points_to_slice
//!                          ▼
//! evaluator        ──► SeriesSlice [ValueSeries, ...]     (dense, start + step)
//! ```
//!
//! `PointSeries` is what the stores hand back: points bucketed at a step,
//! possibly with gaps. `ValueSeries` is what functions operate on: a dense
//! value vector with a start and a step, plus an optional display alias.

pub mod map;
pub mod point;
pub mod slice;
pub mod value;

pub use map::SeriesMap;
pub use point::PointSeries;
pub use slice::{Normalized, SeriesSlice, Zip};
pub use value::ValueSeries;
