//! HTTP surface
//!
//! # Endpoints
//!
//! - `GET|POST /render` - evaluate `target` expressions over `from`/`until`
//! - `POST /datapoints` - insert one metric's datapoints
//! - `GET /ping` - hot store reachability
//! - `GET /inspect` - build info, retention ladder, effective config

pub mod handlers;
pub mod types;

use crate::config::ApplicationConfig;
use crate::engine::traits::SeriesReader;
use crate::error::Result;
use crate::storage::Storage;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chrono::FixedOffset;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state of every handler
pub struct AppState {
    /// Read/write storage
    pub storage: Storage,
    /// What `/render` evaluates against, usually `storage`
    pub reader: Arc<dyn SeriesReader>,
    /// Effective configuration
    pub config: Arc<ApplicationConfig>,
    /// Zone for absolute times
    pub location: FixedOffset,
    /// `/render` budget
    pub render_timeout: Duration,
}

impl AppState {
    /// State reading from and writing to `storage`
    pub fn new(storage: Storage, config: Arc<ApplicationConfig>) -> Result<Self> {
        let location = config.location()?;
        let render_timeout = config.render_timeout();
        let reader: Arc<dyn SeriesReader> = Arc::new(storage.clone());
        Ok(Self {
            storage,
            reader,
            config,
            location,
            render_timeout,
        })
    }

    /// Evaluate `/render` against a different reader
    pub fn with_reader(mut self, reader: Arc<dyn SeriesReader>) -> Self {
        self.reader = reader;
        self
    }
}

/// Build CORS layer from configuration
fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_allowed_origins);
    Router::new()
        .route("/render", get(handlers::render_get).post(handlers::render_post))
        .route("/datapoints", post(handlers::datapoints))
        .route("/ping", get(handlers::ping))
        .route("/inspect", get(handlers::inspect))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
