//! HTTP Server Integration Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` against in-memory
//! backends.
//!
//! # Test Coverage
//!
//! 1. **Render** - GET and POST, repeated targets, aliasing, defaults
//! 2. **Write** - POST /datapoints then read back
//! 3. **Error Handling** - parse, function, argument, format and time errors
//! 4. **Timeouts** - slow storage bounded by the render budget
//! 5. **Admin** - /ping with and without a reachable hot store, /inspect

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kuba_graphite::{
    api::{build_router, AppState},
    config::ApplicationConfig,
    engine::stubs::{InMemoryHashStore, InMemoryWideColumnStore},
    engine::traits::SeriesReader,
    series::SeriesSlice,
    storage::{Storage, StorageBuilder},
    Result, Timestamp,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// =============================================================================
// Test Server
// =============================================================================

struct TestServer {
    router: Router,
    hot: Arc<InMemoryHashStore>,
}

async fn storage(hot: Arc<InMemoryHashStore>) -> Storage {
    StorageBuilder::new()
        .with_hot_store(hot)
        .with_cold_store(Arc::new(InMemoryWideColumnStore::new()))
        .build()
        .await
        .unwrap()
}

async fn create_test_server() -> TestServer {
    let hot = Arc::new(InMemoryHashStore::new());
    let state = AppState::new(storage(hot.clone()).await, Arc::new(ApplicationConfig::default()))
        .unwrap();
    TestServer {
        router: build_router(Arc::new(state)),
        hot,
    }
}

/// Helper to send a request and decode the JSON body, if any
async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
    (status, json)
}

/// Helper to make a GET request
async fn get_request(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

/// Helper to make a POST request with a JSON body
async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(router, request).await
}

/// Helper to make a POST request with a urlencoded form
async fn post_form(router: &Router, uri: &str, form: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(router, request).await
}

async fn write_metric(router: &Router, name: &str, points: &[(i64, f64)]) {
    let datapoints: Vec<Value> = points
        .iter()
        .map(|(ts, v)| json!({"timestamp": ts, "value": v}))
        .collect();
    let (status, _) = post_json(
        router,
        "/datapoints",
        json!({"metric": {"name": name, "datapoints": datapoints}}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// =============================================================================
// Tests: Render
// =============================================================================

#[tokio::test]
async fn test_write_then_render() {
    let server = create_test_server().await;
    write_metric(&server.router, "web.hits", &[(60, 1.0), (120, 2.0), (240, 4.0)]).await;

    let (status, json) = get_request(&server.router, "/render?target=web.hits&from=0&until=300").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!([{"target": "web.hits", "datapoints": [[1.0, 60], [2.0, 120], [null, 180], [4.0, 240]]}])
    );
}

#[tokio::test]
async fn test_render_alias_and_repeated_targets() {
    let server = create_test_server().await;
    write_metric(&server.router, "a.x", &[(60, 1.0)]).await;
    write_metric(&server.router, "a.y", &[(60, 2.0)]).await;

    let uri = "/render?target=alias(a.x,%22Large%20Blue%20Widgets%22)&target=sumSeries(a.%7Bx,y%7D)&from=0&until=120";
    let (status, json) = get_request(&server.router, uri).await;
    assert_eq!(status, StatusCode::OK);
    let series = json.as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["target"], "Large Blue Widgets");
    assert_eq!(series[0]["datapoints"], json!([[1.0, 60]]));
    assert_eq!(series[1]["target"], "sumSeries(a.x,a.y)");
    assert_eq!(series[1]["datapoints"], json!([[3.0, 60]]));
}

#[tokio::test]
async fn test_render_post_form() {
    let server = create_test_server().await;
    write_metric(&server.router, "a.x", &[(60, 5.0)]).await;

    let (status, json) = post_form(
        &server.router,
        "/render?from=0",
        "target=scale(a.x,2)&until=120&format=json",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["target"], "scale(a.x,2)");
    assert_eq!(json[0]["datapoints"], json!([[10.0, 60]]));
}

#[tokio::test]
async fn test_render_unknown_series_is_empty() {
    let server = create_test_server().await;
    let (status, json) = get_request(&server.router, "/render?target=no.such.metric&from=0&until=60").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

// =============================================================================
// Tests: Errors
// =============================================================================

#[tokio::test]
async fn test_parse_error_is_bad_request() {
    let server = create_test_server().await;
    let (status, json) = get_request(&server.router, "/render?target=alias(").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("failed to parse"));
}

#[tokio::test]
async fn test_unknown_function_is_bad_request() {
    let server = create_test_server().await;
    let (status, json) = get_request(&server.router, "/render?target=frobnicate(a.b)").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("frobnicate"));
}

#[tokio::test]
async fn test_client_errors() {
    let server = create_test_server().await;
    for uri in [
        "/render?target=alias(a.b)",
        "/render?target=a.b&from=-3q",
        "/render?target=a.b&format=csv",
        "/render?target=a.b&from=200&until=100",
        "/render?target=a.b&from=0&until=100000000000000",
        "/render?target=a.b&until=now%2B9223372036854775807s",
        "/render",
    ] {
        let (status, json) = get_request(&server.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(json["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_invalid_datapoints_body() {
    let server = create_test_server().await;
    let (status, _) = post_json(&server.router, "/datapoints", json!({"nope": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &server.router,
        "/datapoints",
        json!({"metric": {"name": " ", "datapoints": []}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let server = create_test_server().await;
    server.hot.set_available(false);
    let (status, json) = get_request(&server.router, "/render?target=a.b&from=0&until=60").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].is_string());
}

/// Reader that never answers in time
struct SlowReader;

#[async_trait]
impl SeriesReader for SlowReader {
    async fn fetch(&self, _name: &str, _from: Timestamp, _until: Timestamp) -> Result<SeriesSlice> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(SeriesSlice::new())
    }
}

#[tokio::test]
async fn test_render_timeout() {
    let hot = Arc::new(InMemoryHashStore::new());
    let mut state = AppState::new(storage(hot).await, Arc::new(ApplicationConfig::default()))
        .unwrap()
        .with_reader(Arc::new(SlowReader));
    state.render_timeout = Duration::from_millis(50);
    let router = build_router(Arc::new(state));

    let (status, json) = get_request(&router, "/render?target=a.b&from=0&until=60").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("timeout"));
}

// =============================================================================
// Tests: Admin
// =============================================================================

#[tokio::test]
async fn test_ping() {
    let server = create_test_server().await;
    let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"pong");

    server.hot.set_available(false);
    let (status, _) = get_request(&server.router, "/ping").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_inspect() {
    let server = create_test_server().await;
    let (status, json) = get_request(&server.router, "/inspect").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "kuba-graphite");
    assert_eq!(json["hot_backend"], "in-memory-hash-v1");
    assert_eq!(json["retentions"].as_array().unwrap().len(), 4);
    assert_eq!(json["retentions"][0]["slot"], "1m");
    assert!(json["functions"]
        .as_array()
        .unwrap()
        .contains(&json!("sumSeries")));
    assert_eq!(json["config"]["server"]["port"], 8080);
}
