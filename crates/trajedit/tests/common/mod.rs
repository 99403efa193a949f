//! Test utilities and common setup.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use trajedit::AppState;

/// Create a test application backed by a temporary data directory.
///
/// The directory is removed when the returned guard is dropped.
pub fn test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(dir.path().join("data"));
    (trajedit::app(state), dir)
}

/// Send a request and decode the JSON response body.
pub async fn send(app: Router, method: Method, uri: &str, body: Option<&Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_string(json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(&body)).await
}

/// Decode the `modified_content` string of an edit response.
pub fn modified(json: &Value) -> Value {
    serde_json::from_str(json["modified_content"].as_str().unwrap()).unwrap()
}
