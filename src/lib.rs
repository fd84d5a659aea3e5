//! Kuba Graphite - Graphite-compatible query front-end over a hot and a cold tier
//!
//! This library provides:
//! - A render target language (lexer, parser, parallel evaluator, function table)
//! - Series algebra with NaN-aware reductions
//! - A hot tier on Redis hashes with rollup into coarser resolutions
//! - A cold tier on a wide-column store, bucketed by item epoch
//! - An axum HTTP surface (`/render`, `/datapoints`, `/ping`, `/inspect`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod numeric;
pub mod series;
pub mod types;

/// Configuration with TOML and environment overrides
pub mod config;

/// Brace and comma-list expansion of metric names
pub mod expand;

/// Graphite-style absolute and relative time strings
pub mod timeparser;

/// The retention ladder shared by reads and writes
pub mod retention;

/// Render target language and evaluator
pub mod query;

/// Redis hot tier backend
pub mod redis;

/// Hot/cold storage adapters and the orchestrator
pub mod storage;

/// HTTP router and handlers
pub mod api;

// Re-export main types
pub use error::{Error, Result};
pub use storage::{Storage, StorageBuilder};
pub use types::{DataPoint, Metric, Timestamp};
