use axum::Json;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::db::repository;
use crate::error::AppError;
use crate::lifecycle::planner::batches;
use crate::lifecycle::{CommitReport, Mode, Reconciliation, TaskView, Verdict};
use crate::models::*;
use crate::state::AppState;

const USER_HEADER: &str = "x-user-id";
const MAX_PAGE_SIZE: i64 = 100;
const MAX_TRAVEL_DAYS: i64 = 3650;

/// Caller identity taken from the `x-user-id` header.
#[derive(Debug, Clone)]
pub struct UserScope(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserScope {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserScope(v.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub mode: Mode,
    pub now: DateTime<Utc>,
    pub tasks: Vec<TaskView>,
    pub report: CommitReport,
}

#[derive(Debug, Serialize)]
pub struct VerdictResponse {
    pub id: TaskId,
    pub now: DateTime<Utc>,
    #[serde(flatten)]
    pub verdict: Verdict,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

#[derive(Debug, Serialize)]
pub struct ClockResponse {
    pub now: DateTime<Utc>,
    pub real_now: DateTime<Utc>,
    pub simulated: Option<DateTime<Utc>>,
    pub mode: Mode,
}

#[derive(Debug, Deserialize)]
pub struct SetClockRequest {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceClockRequest {
    pub days: i64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/categories", get(list_categories))
        .route(
            "/tasks",
            get(list_tasks).post(create_task).delete(delete_all_tasks),
        )
        .route("/tasks/archived", get(list_archived))
        .route("/tasks/archived/count", get(count_archived))
        .route("/tasks/archive-completed", post(archive_completed))
        .route("/tasks/delete", post(delete_tasks))
        .route("/tasks/{id}", patch(update_task))
        .route("/tasks/{id}/complete", patch(complete_task))
        .route("/tasks/{id}/archive", patch(archive_task))
        .route("/tasks/{id}/restore", patch(restore_task))
        .route("/tasks/{id}/verdict", get(task_verdict))
        .route("/reconcile", post(reconcile))
        .route(
            "/clock",
            get(get_clock).put(set_clock).delete(reset_clock),
        )
        .route("/clock/advance", post(advance_clock))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_categories() -> Json<Vec<CategoryInfo>> {
    Json(Category::ALL.iter().map(|c| c.info()).collect())
}

async fn list_tasks(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
) -> Result<Json<TaskListResponse>, AppError> {
    let Reconciliation {
        mode,
        now,
        report,
        view,
        ..
    } = state.lifecycle.refresh(&user_id).await?;

    Ok(Json(TaskListResponse {
        mode,
        now,
        tasks: view.active,
        report,
    }))
}

async fn create_task(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Json(mut req): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    req.text = req.text.trim().to_string();
    if req.text.is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let task = repository::insert_task(&state.db, &user_id, req, state.wall_clock.now()).await?;
    info!(id = %task.id, category = %task.category, "created task");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    if req.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let task = repository::update_task(&state.db, &user_id, &id, req, state.wall_clock.now())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn complete_task(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Path(id): Path<String>,
    Json(req): Json<CompleteTaskRequest>,
) -> Result<StatusCode, AppError> {
    let now = state.wall_clock.now();
    let ok = repository::set_completed(&state.db, &user_id, &id, req.completed, now).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn archive_task(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::archive_task(&state.db, &user_id, &id, state.wall_clock.now()).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn restore_task(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::restore_task(&state.db, &user_id, &id, state.wall_clock.now()).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn task_verdict(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Path(id): Path<String>,
) -> Result<Json<VerdictResponse>, AppError> {
    let (now, verdict) = state
        .lifecycle
        .verdict(&user_id, &id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(VerdictResponse { id, now, verdict }))
}

async fn list_archived(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    if !(1..=MAX_PAGE_SIZE).contains(&query.page_size) || query.page_offset < 0 {
        return Err(AppError::BadRequest(format!(
            "page_size must be within 1..={} and page_offset non-negative",
            MAX_PAGE_SIZE
        )));
    }

    let tasks = state.lifecycle.archived(&user_id, &query).await?;
    Ok(Json(tasks))
}

async fn count_archived(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<CountResponse>, AppError> {
    let stored = repository::count_archived_tasks(&state.db, &user_id, query.search_term()).await?;
    let projected = state
        .lifecycle
        .projected_archive_matching(&user_id, query.search_term())
        .await?
        .len();

    Ok(Json(CountResponse {
        count: stored + projected as i64,
    }))
}

async fn archive_completed(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Json(req): Json<TaskIdsRequest>,
) -> Result<Json<AffectedResponse>, AppError> {
    let now = state.wall_clock.now();
    let mut affected = 0;
    for batch in batches(&req.ids, state.config.batch_size) {
        affected += repository::archive_tasks(&state.db, &user_id, batch, now).await?;
    }
    Ok(Json(AffectedResponse { affected }))
}

async fn delete_tasks(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
    Json(req): Json<TaskIdsRequest>,
) -> Result<Json<AffectedResponse>, AppError> {
    let mut affected = 0;
    for batch in batches(&req.ids, state.config.batch_size) {
        affected += repository::delete_tasks(&state.db, &user_id, batch).await?;
    }
    info!(user_id = %user_id, affected, "permanently deleted tasks");
    Ok(Json(AffectedResponse { affected }))
}

async fn delete_all_tasks(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
) -> Result<Json<AffectedResponse>, AppError> {
    let affected = repository::delete_all_tasks(&state.db, &user_id).await?;
    info!(user_id = %user_id, affected, "deleted all tasks");
    Ok(Json(AffectedResponse { affected }))
}

async fn reconcile(
    State(state): State<AppState>,
    UserScope(user_id): UserScope,
) -> Result<Json<Reconciliation>, AppError> {
    Ok(Json(state.lifecycle.refresh(&user_id).await?))
}

fn clock_response(state: &AppState) -> ClockResponse {
    let reading = state.clock.reading();
    ClockResponse {
        now: reading.now,
        real_now: state.clock.real_now(),
        simulated: reading.simulated.then_some(reading.now),
        mode: Mode::for_reading(reading),
    }
}

fn ensure_time_travel(state: &AppState) -> Result<(), AppError> {
    if state.config.time_travel_enabled {
        Ok(())
    } else {
        Err(AppError::Forbidden("time travel is disabled".to_string()))
    }
}

async fn get_clock(State(state): State<AppState>) -> Json<ClockResponse> {
    Json(clock_response(&state))
}

async fn set_clock(
    State(state): State<AppState>,
    Json(req): Json<SetClockRequest>,
) -> Result<Json<ClockResponse>, AppError> {
    ensure_time_travel(&state)?;
    if let Some(at) = req.at {
        let offset = at.signed_duration_since(state.clock.real_now());
        if offset.num_days().abs() > MAX_TRAVEL_DAYS {
            return Err(AppError::BadRequest(format!(
                "at must be within {} days of the current time",
                MAX_TRAVEL_DAYS
            )));
        }
    }
    state.clock.set(req.at);
    Ok(Json(clock_response(&state)))
}

async fn advance_clock(
    State(state): State<AppState>,
    Json(req): Json<AdvanceClockRequest>,
) -> Result<Json<ClockResponse>, AppError> {
    ensure_time_travel(&state)?;
    if req.days == 0 || req.days.abs() > MAX_TRAVEL_DAYS {
        return Err(AppError::BadRequest(format!(
            "days must be non-zero and within ±{}",
            MAX_TRAVEL_DAYS
        )));
    }
    state
        .clock
        .advance(Duration::days(req.days))
        .ok_or_else(|| AppError::BadRequest("clock cannot move that far".to_string()))?;
    Ok(Json(clock_response(&state)))
}

async fn reset_clock(State(state): State<AppState>) -> Result<Json<ClockResponse>, AppError> {
    ensure_time_travel(&state)?;
    state.clock.clear();
    Ok(Json(clock_response(&state)))
}
