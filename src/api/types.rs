//! Request and response bodies of the HTTP API

use crate::retention::Retention;
use crate::series::{SeriesSlice, ValueSeries};
use crate::types::{DataPoint, Metric, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// Render Types
// =============================================================================

/// Parameters of one `/render` request
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderParams {
    /// Every `target` value, in request order
    pub targets: Vec<String>,
    /// Raw `from`
    pub from: Option<String>,
    /// Raw `until`
    pub until: Option<String>,
    /// Raw `format`
    pub format: Option<String>,
}

impl RenderParams {
    /// Collect parameters from a urlencoded query string or form body
    ///
    /// `target` may repeat; `target[]` is accepted as a synonym. Unknown
    /// keys are ignored.
    pub fn extend_from_urlencoded(&mut self, input: &[u8]) {
        for (key, value) in url::form_urlencoded::parse(input) {
            match key.as_ref() {
                "target" | "target[]" => {
                    if !value.trim().is_empty() {
                        self.targets.push(value.into_owned());
                    }
                }
                "from" => self.from = Some(value.into_owned()),
                "until" => self.until = Some(value.into_owned()),
                "format" => self.format = Some(value.into_owned()),
                _ => {}
            }
        }
    }
}

/// One series of a `/render` response
#[derive(Debug, Serialize, PartialEq)]
pub struct RenderSeries {
    /// Display name
    pub target: String,
    /// `[value, timestamp]` pairs, `null` for missing values
    pub datapoints: Vec<(Option<f64>, Timestamp)>,
}

impl From<&ValueSeries> for RenderSeries {
    fn from(series: &ValueSeries) -> Self {
        Self {
            target: series.alias().to_string(),
            datapoints: series
                .points()
                .map(|p| ((!p.value.is_nan()).then_some(p.value), p.timestamp))
                .collect(),
        }
    }
}

/// Flatten evaluated targets into the response body
pub fn render_body(results: &[SeriesSlice]) -> Vec<RenderSeries> {
    results
        .iter()
        .flat_map(|slice| slice.iter().map(RenderSeries::from))
        .collect()
}

// =============================================================================
// Write Types
// =============================================================================

/// `/datapoints` body
#[derive(Debug, Deserialize)]
pub struct DatapointsRequest {
    /// The metric to insert
    pub metric: MetricPayload,
}

/// A named list of points
#[derive(Debug, Deserialize)]
pub struct MetricPayload {
    /// Dotted metric path
    pub name: String,
    /// Points in insertion order
    #[serde(default)]
    pub datapoints: Vec<DataPoint>,
}

impl From<MetricPayload> for Metric {
    fn from(payload: MetricPayload) -> Self {
        Metric::new(payload.name, payload.datapoints)
    }
}

// =============================================================================
// Inspect & Error Types
// =============================================================================

/// `/inspect` body
#[derive(Debug, Serialize)]
pub struct InspectResponse {
    /// Package name
    pub name: &'static str,
    /// Package version
    pub version: &'static str,
    /// Hot backend identifier
    pub hot_backend: String,
    /// Cold backend identifier
    pub cold_backend: String,
    /// Cold table
    pub cold_table: String,
    /// Known render functions
    pub functions: Vec<&'static str>,
    /// Retention ladder, finest first
    pub retentions: &'static [Retention],
    /// Effective configuration with secrets masked
    pub config: serde_json::Value,
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
}
