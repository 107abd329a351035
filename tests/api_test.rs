use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use owldone::api::router;
use owldone::clock::FixedClock;
use owldone::config::AppConfig;
use owldone::db::repository;
use owldone::models::Category;
use owldone::state::AppState;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Wednesday 2024-01-03, 09:00 UTC.
fn wall() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()
}

async fn app_with(time_travel_enabled: bool) -> (Router, AppState) {
    let pool = setup_test_db().await;
    let config = AppConfig {
        time_travel_enabled,
        ..AppConfig::default()
    };
    let state = AppState::with_wall_clock(pool, config, Arc::new(FixedClock(wall())));
    (router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, Some("alice"), method, uri, body).await
}

async fn send_as(
    app: &Router,
    user: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, text: &str, category: &str) -> Value {
    let (status, task) = send(
        app,
        "POST",
        "/tasks",
        Some(json!({ "text": text, "category": category })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    task
}

#[tokio::test]
async fn test_requests_without_user_are_rejected() {
    let (app, _) = app_with(false).await;

    let (status, body) = send_as(&app, None, "GET", "/tasks", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
async fn test_create_and_list_tasks() {
    let (app, _) = app_with(false).await;

    let task = create(&app, "  buy milk  ", "today").await;
    assert_eq!(task["text"], "buy milk");
    assert_eq!(task["category"], "today");
    assert_eq!(task["completed"], false);

    let (status, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "commit");
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(body["tasks"][0]["id"], task["id"]);
    assert_eq!(body["tasks"][0]["is_overdue"], false);

    let (_, other) = send_as(&app, Some("bob"), "GET", "/tasks", None).await;
    assert!(other["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_blank_text() {
    let (app, _) = app_with(false).await;

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(json!({ "text": "   ", "category": "today" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_change_restarts_deadline() {
    let (app, state) = app_with(false).await;
    let task = create(&app, "write report", "next_week").await;
    let id = task["id"].as_str().unwrap();

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/tasks/{}", id),
        Some(json!({ "category": "this_week" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["category"], "this_week");

    let stored = repository::find_task_by_id(&state.db, "alice", id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.category, Category::ThisWeek);
    assert_eq!(stored.created_at, wall());

    let (status, _) = send(
        &app,
        "PATCH",
        "/tasks/missing",
        Some(json!({ "text": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_time_travel_previews_without_persisting() {
    let (app, state) = app_with(true).await;
    let task = create(&app, "plan trip", "next_week").await;
    let id = task["id"].as_str().unwrap().to_string();

    let (status, clock) = send(
        &app,
        "PUT",
        "/clock",
        Some(json!({ "at": "2024-01-08T12:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clock["mode"], "render");

    let (_, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(body["mode"], "render");
    assert_eq!(body["tasks"][0]["category"], "this_week");

    let (_, verdict) = send(&app, "GET", &format!("/tasks/{}/verdict", id), None).await;
    assert_eq!(verdict["transition"]["kind"], "recategorize");
    assert_eq!(verdict["transition"]["target"], "this_week");

    let stored = repository::find_task_by_id(&state.db, "alice", &id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.category, Category::NextWeek);

    let (status, clock) = send(&app, "DELETE", "/clock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clock["mode"], "commit");
    assert!(clock["simulated"].is_null());

    let (_, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(body["tasks"][0]["category"], "next_week");
}

#[tokio::test]
async fn test_simulated_archive_shows_in_archive_list() {
    let (app, state) = app_with(true).await;
    let task = create(&app, "laundry", "today").await;
    let id = task["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/tasks/{}/complete", id),
        Some(json!({ "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "POST", "/clock/advance", Some(json!({ "days": 1 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, archived) = send(&app, "GET", "/tasks/archived", None).await;
    assert_eq!(archived[0]["id"], id);
    let (_, count) = send(&app, "GET", "/tasks/archived/count", None).await;
    assert_eq!(count["count"], 1);

    let stored = repository::find_task_by_id(&state.db, "alice", &id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.removed);
}

#[tokio::test]
async fn test_clock_writes_need_time_travel() {
    let (app, _) = app_with(false).await;

    let (status, clock) = send(&app, "GET", "/clock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clock["mode"], "commit");

    let (status, _) = send(&app, "POST", "/clock/advance", Some(json!({ "days": 3 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_clock_rejects_far_instants() {
    let (app, _) = app_with(true).await;

    let (status, _) = send(
        &app,
        "PUT",
        "/clock",
        Some(json!({ "at": "2999-12-31T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, clock) = send(&app, "GET", "/clock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(clock["simulated"].is_null());

    let (status, _) = send(&app, "POST", "/clock/advance", Some(json!({ "days": 3651 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, clock) = send(&app, "POST", "/clock/advance", Some(json!({ "days": 3650 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clock["simulated"], "2033-12-31T09:00:00Z");
}

#[tokio::test]
async fn test_archive_restore_and_delete() {
    let (app, _) = app_with(false).await;
    let first = create(&app, "first", "today").await;
    let second = create(&app, "second", "others").await;
    let first_id = first["id"].as_str().unwrap().to_string();
    let second_id = second["id"].as_str().unwrap().to_string();

    let (_, body) = send(
        &app,
        "POST",
        "/tasks/archive-completed",
        Some(json!({ "ids": [first_id, second_id] })),
    )
    .await;
    assert_eq!(body["affected"], 2);

    let (_, archived) = send(&app, "GET", "/tasks/archived?search=FIR", None).await;
    assert_eq!(archived.as_array().unwrap().len(), 1);
    assert_eq!(archived[0]["id"], first_id);

    let (status, _) = send(&app, "PATCH", &format!("/tasks/{}/restore", first_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(body["tasks"][0]["id"], first_id);

    let (_, body) = send(
        &app,
        "POST",
        "/tasks/delete",
        Some(json!({ "ids": [second_id] })),
    )
    .await;
    assert_eq!(body["affected"], 1);
    let (_, count) = send(&app, "GET", "/tasks/archived/count", None).await;
    assert_eq!(count["count"], 0);

    let (status, _) = send(&app, "GET", "/tasks/archived?page_size=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
