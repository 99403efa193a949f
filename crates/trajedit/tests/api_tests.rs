//! API integration tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use trajedit_core::testing::{mock_history_only, mock_trajectory};

mod common;
use common::{modified, post_json, send, test_app};

fn content_of(doc: &Value) -> String {
    serde_json::to_string(doc).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = test_app();

    let (status, json) = send(app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["data_dir"].as_str().unwrap().ends_with("data"));
}

#[tokio::test]
async fn test_replace_thought_cascades() {
    let (app, _dir) = test_app();
    let doc = mock_trajectory(3);

    let (status, json) = post_json(
        app,
        "/replace_thought",
        json!({
            "content": content_of(&doc),
            "original_index": 2,
            "old_thought": "thought_2",
            "new_thought": "NEW_THOUGHT",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    let updated = modified(&json);

    assert_eq!(updated["trajectory"][1]["thought"], "NEW_THOUGHT");
    assert_eq!(updated["trajectory"][1]["response"], "NEW_THOUGHT");
    assert_eq!(updated["trajectory"][2]["query"][4]["thought"], "NEW_THOUGHT");
    assert_eq!(updated["trajectory"][2]["query"][4]["content"], "NEW_THOUGHT");
    assert_eq!(updated["history"][4]["thought"], "NEW_THOUGHT");
    assert_eq!(updated["history"][4]["content"], "NEW_THOUGHT");

    // Earlier steps never saw step 2, so their snapshots are untouched.
    assert_eq!(updated["trajectory"][1]["query"], doc["trajectory"][1]["query"]);
}

#[tokio::test]
async fn test_replace_thought_stale_edit() {
    let (app, _dir) = test_app();

    let (status, json) = post_json(
        app,
        "/replace_thought",
        json!({
            "content": content_of(&mock_trajectory(3)),
            "original_index": 2,
            "old_thought": "something else",
            "new_thought": "NEW_THOUGHT",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "STALE_EDIT");
}

#[tokio::test]
async fn test_replace_thought_history_only() {
    let (app, _dir) = test_app();

    let (status, json) = post_json(
        app,
        "/replace_thought",
        json!({
            "content": content_of(&mock_history_only(2)),
            "original_index": 1,
            "new_thought": "rewritten",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    let updated = modified(&json);
    assert_eq!(updated["history"][2]["thought"], "rewritten");
    assert_eq!(updated["history"][2]["content"], "rewritten");
    assert!(updated.get("trajectory").is_none());
}

#[tokio::test]
async fn test_remove_step_cascades() {
    let (app, _dir) = test_app();
    let doc = mock_trajectory(4);

    let (status, json) = post_json(
        app,
        "/remove_step",
        json!({ "content": content_of(&doc), "original_index": 2 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    let updated = modified(&json);

    assert_eq!(updated["trajectory"].as_array().unwrap().len(), 3);
    assert_eq!(updated["history"].as_array().unwrap().len(), 8);
    assert_eq!(updated["info"]["model_stats"]["api_calls"], 3);

    let removed = ["thought_2", "OBSERVATION for action_2"];
    let snapshots = updated["trajectory"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|step| step["query"].as_array().unwrap().iter());
    for message in snapshots.chain(updated["history"].as_array().unwrap().iter()) {
        let content = message["content"].as_str().unwrap_or("");
        assert!(!removed.contains(&content), "leftover echo: {message}");
        assert_ne!(message["thought"], "thought_2");
    }
}

#[tokio::test]
async fn test_remove_step_out_of_range() {
    let (app, _dir) = test_app();

    let (status, json) = post_json(
        app,
        "/remove_step",
        json!({ "content": content_of(&mock_trajectory(2)), "original_index": 7 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "OUT_OF_RANGE");
}

#[tokio::test]
async fn test_missing_fields_are_bad_requests() {
    let (app, _dir) = test_app();
    let (status, json) = post_json(
        app,
        "/replace_thought",
        json!({ "content": content_of(&mock_trajectory(2)), "original_index": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");

    let (app, _dir) = test_app();
    let (status, json) = post_json(app, "/remove_step", json!({ "original_index": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unparseable_body_is_bad_request() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/remove_step")
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_malformed_and_unsupported_documents() {
    let (app, _dir) = test_app();
    let (status, json) = post_json(
        app,
        "/remove_step",
        json!({ "content": "{\"trajectory\": [", "original_index": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MALFORMED_DOCUMENT");

    let (app, _dir) = test_app();
    let (status, json) = post_json(
        app,
        "/remove_step",
        json!({ "content": "{\"steps\": []}", "original_index": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_bulk_replace() {
    let (app, _dir) = test_app();
    let doc = mock_trajectory(3);

    let (status, json) = post_json(
        app,
        "/replace",
        json!({
            "content": content_of(&doc),
            "search_term": r"OBSERVATION for action_(\d)",
            "replace_term": "observed",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["replacements"], 3);
    let updated = modified(&json);
    assert_eq!(updated["history"][3]["content"], "observed");
    assert_eq!(updated["trajectory"], doc["trajectory"]);
}

#[tokio::test]
async fn test_bulk_replace_failures() {
    let (app, _dir) = test_app();
    let (status, json) = post_json(
        app,
        "/replace",
        json!({
            "content": content_of(&mock_trajectory(1)),
            "search_term": "never present",
            "replace_term": "x",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NO_MATCH");

    let (app, _dir) = test_app();
    let (status, json) = post_json(
        app,
        "/replace",
        json!({
            "content": content_of(&mock_trajectory(1)),
            "search_term": "([unclosed",
            "replace_term": "x",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_PATTERN");
}

#[tokio::test]
async fn test_steps_endpoint() {
    let (app, _dir) = test_app();

    let (status, json) = post_json(
        app,
        "/steps",
        json!({ "content": content_of(&mock_trajectory(2)) }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["steps"][0]["isStepZero"], true);
    assert_eq!(json["steps"][1]["thought"], "thought_1");
    assert_eq!(json["prompt"][0]["content"], "Initial user instruction");
    assert_eq!(json["prompt"][2]["observation"], "OBSERVATION for action_2");
}

#[tokio::test]
async fn test_save_then_list_files() {
    let (app, dir) = test_app();

    let (status, json) = post_json(
        app.clone(),
        "/save",
        json!({ "content": content_of(&mock_trajectory(2)), "filename": "run.json" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert!(json["message"].as_str().unwrap().contains("run.json"));
    assert!(dir.path().join("data").join("run.json").is_file());

    let (status, json) = send(app, Method::GET, "/files", None).await;
    assert_eq!(status, StatusCode::OK);
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["name"], "run.json");
    assert_eq!(files[0]["dialect"], "trajectory_with_history");
    assert_eq!(files[0]["steps"], 2);
    assert_eq!(files[0]["resolved"], true);
}

#[tokio::test]
async fn test_save_rejects_traversal() {
    let (app, dir) = test_app();

    let (status, json) = post_json(
        app,
        "/save",
        json!({ "content": "{}", "filename": "../escape.json" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(!dir.path().join("escape.json").exists());
}

#[tokio::test]
async fn test_list_files_empty_data_dir() {
    let (app, _dir) = test_app();

    let (status, json) = send(app, Method::GET, "/files", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["files"], json!([]));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .method(Method::GET)
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
