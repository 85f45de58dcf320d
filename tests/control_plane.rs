mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use crate::common::{build_test_app, build_test_app_with_delay};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn source_entry<'a>(body: &'a Value, key: &str) -> &'a Value {
    body["sources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["source_key"] == key)
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (app, _state) = build_test_app().await;
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_lists_all_seeded_sources() {
    let (app, _state) = build_test_app().await;
    let (status, body) = send(&app, get("/api/sync/status")).await;
    assert_eq!(status, StatusCode::OK);

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert_eq!(source_entry(&body, "FACULTY")["mode"], "INTERVAL");
    assert_eq!(source_entry(&body, "LMS")["mode"], "CONTINUOUS");
    assert_eq!(source_entry(&body, "STUDENTS")["status"], "IDLE");
}

#[tokio::test]
async fn trigger_runs_an_interval_source_to_completion() {
    let (app, _state) = build_test_app().await;

    let (status, body) = send(&app, post("/api/sync/faculty/trigger")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_key"], "FACULTY");
    let sync_id = body["sync_id"].as_i64().unwrap();
    assert!(sync_id > 0);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let (_, body) = send(&app, get("/api/sync/status")).await;
    let faculty = source_entry(&body, "FACULTY");
    assert_eq!(faculty["status"], "SUCCESS");
    assert_eq!(faculty["last_records_synced"], 12);

    // terminal progress survives until the purge grace expires
    let (status, body) = send(&app, get("/api/sync/faculty/progress")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["status"], "SUCCESS");
    assert_eq!(body["progress"]["percent"], 100);

    let (status, body) = send(&app, get("/api/sync/faculty/actions")).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action_kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"manual_sync_started"));
    assert!(kinds.contains(&"manual_sync_completed"));
}

#[tokio::test]
async fn unknown_source_is_a_not_found() {
    let (app, _state) = build_test_app().await;
    let (status, body) = send(&app, post("/api/sync/payroll/trigger")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");
}

#[tokio::test]
async fn concurrent_trigger_conflicts_then_stop_lands_sticky() {
    let (app, _state) = build_test_app_with_delay(500).await;

    let (status, _) = send(&app, post("/api/sync/students/trigger")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post("/api/sync/students/trigger")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "ALREADY_RUNNING");

    let (status, _) = send(&app, post("/api/sync/students/stop")).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (_, body) = send(&app, get("/api/sync/status")).await;
    assert_eq!(source_entry(&body, "STUDENTS")["status"], "STOPPED");
}

#[tokio::test]
async fn stop_with_nothing_running_conflicts() {
    let (app, _state) = build_test_app().await;
    let (status, body) = send(&app, post("/api/sync/faculty/stop")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "NOT_RUNNING");
}

#[tokio::test]
async fn auto_config_is_validated_and_persisted() {
    let (app, _state) = build_test_app().await;

    let (status, body) = send(
        &app,
        put_json(
            "/api/sync/faculty/auto",
            json!({"enabled": true, "interval_minutes": 0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "CONFIG_INVALID");

    let (status, body) = send(
        &app,
        put_json(
            "/api/sync/faculty/auto",
            json!({"enabled": true, "interval_minutes": 30}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auto_enabled"], true);
    assert_eq!(body["interval_minutes"], 30);

    let (_, body) = send(&app, get("/api/sync/status")).await;
    let faculty = source_entry(&body, "FACULTY");
    assert_eq!(faculty["auto_enabled"], true);
    assert_eq!(faculty["interval_minutes"], 30);
}

#[tokio::test]
async fn enabling_auto_on_lms_runs_the_continuous_loop() {
    let (app, _state) = build_test_app().await;

    let (status, _) = send(&app, put_json("/api/sync/lms/auto", json!({"enabled": true}))).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (_, body) = send(&app, get("/api/sync/status")).await;
    let lms = source_entry(&body, "LMS");
    assert_eq!(lms["status"], "RUNNING");
    assert_eq!(lms["last_records_synced"], 5);
    assert!(lms["next_run_at"].is_null());

    let (_, body) = send(&app, get("/api/sync/lms/progress")).await;
    assert_eq!(body["progress"]["status"], "RUNNING");

    let (status, _) = send(&app, put_json("/api/sync/lms/auto", json!({"enabled": false}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/sync/status")).await;
    assert_eq!(source_entry(&body, "LMS")["status"], "STOPPED");
}

#[tokio::test]
async fn manual_trigger_of_continuous_source_runs_one_pass() {
    let (app, _state) = build_test_app().await;

    let (status, body) = send(&app, post("/api/sync/lms/trigger")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_key"], "LMS");

    tokio::time::sleep(Duration::from_millis(300)).await;

    // auto is off, so the loop stays down after the one-shot pass
    let (_, body) = send(&app, get("/api/sync/status")).await;
    let lms = source_entry(&body, "LMS");
    assert_eq!(lms["status"], "SUCCESS");
    assert_eq!(lms["last_records_synced"], 5);
}
