//! HTTP handlers

use super::types::*;
use super::AppState;
use crate::error::Error;
use crate::query::{eval_targets, functions, EvalContext};
use crate::retention::{check_window, LADDER};
use crate::series::SeriesSlice;
use crate::timeparser::parse_at_time;
use crate::types::Metric;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default `/render` window
const DEFAULT_WINDOW_SECS: i64 = 24 * 3600;

// =============================================================================
// Error Mapping
// =============================================================================

/// Library error rendered as `{"error": ...}`
///
/// Client errors become 400, everything else 500.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// Render
// =============================================================================

/// `GET /render`
pub async fn render_get(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<RenderSeries>>, ApiError> {
    let mut params = RenderParams::default();
    params.extend_from_urlencoded(query.unwrap_or_default().as_bytes());
    render(state, params).await
}

/// `POST /render` with a urlencoded form; query string parameters also count
pub async fn render_post(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<Vec<RenderSeries>>, ApiError> {
    let mut params = RenderParams::default();
    params.extend_from_urlencoded(query.unwrap_or_default().as_bytes());
    params.extend_from_urlencoded(&body);
    render(state, params).await
}

async fn render(
    state: Arc<AppState>,
    params: RenderParams,
) -> Result<Json<Vec<RenderSeries>>, ApiError> {
    if let Some(format) = params.format.as_deref() {
        if !format.eq_ignore_ascii_case("json") {
            return Err(Error::argument("render", format!("unsupported format {format:?}")).into());
        }
    }
    if params.targets.is_empty() {
        return Err(Error::argument("render", "no target specified").into());
    }

    let now = Utc::now().trunc_subsecs(0);
    let (from, until) = resolve_window(&params, now, &state.location)?;
    debug!(targets = ?params.targets, from, until, "render");

    let context = EvalContext::new(from, until)
        .with_now(now)
        .with_location(state.location);
    let results = evaluate(&state, &params.targets, context).await?;
    Ok(Json(render_body(&results)))
}

fn resolve_window(
    params: &RenderParams,
    now: DateTime<Utc>,
    location: &chrono::FixedOffset,
) -> Result<(i64, i64), Error> {
    let from = match params.from.as_deref() {
        Some(s) => parse_at_time(s, now, location)?,
        None => now.timestamp() - DEFAULT_WINDOW_SECS,
    };
    let until = match params.until.as_deref() {
        Some(s) => parse_at_time(s, now, location)?,
        None => now.timestamp(),
    };
    if from > until {
        return Err(Error::time_parser(
            format!("{from}..{until}"),
            "from must not be after until",
        ));
    }
    check_window(from, until)?;
    Ok((from, until))
}

async fn evaluate(
    state: &AppState,
    targets: &[String],
    context: EvalContext,
) -> Result<Vec<SeriesSlice>, Error> {
    let reader = Arc::clone(&state.reader);
    match tokio::time::timeout(state.render_timeout, eval_targets(reader, targets, context)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout = ?state.render_timeout, "render timed out");
            Err(Error::Timeout(format!(
                "render exceeded {:?}",
                state.render_timeout
            )))
        }
    }
}

// =============================================================================
// Write
// =============================================================================

/// `POST /datapoints`
pub async fn datapoints(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: DatapointsRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::argument("datapoints", format!("invalid body: {e}")))?;
    let metric = Metric::from(request.metric);
    if metric.name.trim().is_empty() {
        return Err(Error::argument("datapoints", "metric name is empty").into());
    }

    debug!(name = %metric.name, points = metric.datapoints.len(), "insert");
    state.storage.insert_metric(&metric).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Admin
// =============================================================================

/// `GET /ping`
pub async fn ping(State(state): State<Arc<AppState>>) -> Response {
    match state.storage.ping().await {
        Ok(()) => (StatusCode::OK, "pong").into_response(),
        Err(e) => {
            warn!(error = %e, "hot store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// `GET /inspect`
pub async fn inspect(State(state): State<Arc<AppState>>) -> Json<InspectResponse> {
    let config = serde_json::to_value(state.config.sanitized()).unwrap_or_else(|e| {
        warn!(error = %e, "config is not serializable");
        serde_json::Value::Null
    });
    Json(InspectResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        hot_backend: state.storage.hot().backend_id().to_string(),
        cold_backend: state.storage.cold().backend_id().to_string(),
        cold_table: state.storage.cold().table().to_string(),
        functions: functions::names().collect(),
        retentions: &LADDER,
        config,
    })
}
