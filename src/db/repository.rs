use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{Category, NewTaskRequest, Task, TaskId, UpdateTaskRequest};

const SELECT_TASKS: &str = "SELECT id, user_id, text, notes, category, completed, completed_at, \
     removed, removed_at, created_at, updated_at FROM tasks";

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_id_list<'a>(qb: &mut QueryBuilder<'a, Sqlite>, ids: &'a [TaskId]) {
    qb.push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}

pub async fn fetch_active_tasks(db: &SqlitePool, user_id: &str) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "{SELECT_TASKS} WHERE user_id = ?1 AND removed = 0 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_archived_tasks(
    db: &SqlitePool,
    user_id: &str,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Task>, sqlx::Error> {
    let pattern = search.map(like_pattern);
    sqlx::query_as::<_, Task>(&format!(
        "{SELECT_TASKS} WHERE user_id = ?1 AND removed = 1 \
         AND (?2 IS NULL OR text LIKE ?2 ESCAPE '\\' OR IFNULL(notes, '') LIKE ?2 ESCAPE '\\') \
         ORDER BY removed_at DESC LIMIT ?3 OFFSET ?4"
    ))
    .bind(user_id)
    .bind(pattern)
    .bind(limit.max(0))
    .bind(offset.max(0))
    .fetch_all(db)
    .await
}

pub async fn count_archived_tasks(
    db: &SqlitePool,
    user_id: &str,
    search: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let pattern = search.map(like_pattern);
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND removed = 1 \
         AND (?2 IS NULL OR text LIKE ?2 ESCAPE '\\' OR IFNULL(notes, '') LIKE ?2 ESCAPE '\\')",
    )
    .bind(user_id)
    .bind(pattern)
    .fetch_one(db)
    .await
}

pub async fn find_task_by_id(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("{SELECT_TASKS} WHERE id = ?1 AND user_id = ?2"))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn insert_task(
    db: &SqlitePool,
    user_id: &str,
    req: NewTaskRequest,
    now: DateTime<Utc>,
) -> Result<Task, sqlx::Error> {
    let mut task = Task::new(user_id, req.text, req.category, now);
    task.notes = req.notes.filter(|n| !n.is_empty());

    sqlx::query(
        r#"
        INSERT INTO tasks
            (id, user_id, text, notes, category, completed, completed_at,
            removed, removed_at, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, 0, NULL, ?6, ?7)
        "#,
    )
    .bind(&task.id)
    .bind(&task.user_id)
    .bind(&task.text)
    .bind(&task.notes)
    .bind(task.category)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(db)
    .await?;

    Ok(task)
}

/// Applies a user edit. A category change restarts the deadline clock.
pub async fn update_task(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    req: UpdateTaskRequest,
    now: DateTime<Utc>,
) -> Result<Option<Task>, sqlx::Error> {
    let mut current = match find_task_by_id(db, user_id, id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if let Some(text) = req.text {
        current.text = text;
    }
    if let Some(notes) = req.notes {
        current.notes = Some(notes).filter(|n| !n.is_empty());
    }
    if let Some(category) = req.category {
        current.move_to(category, now);
    }
    current.updated_at = now;

    sqlx::query(
        r#"
        UPDATE tasks
        SET text = ?1,
            notes = ?2,
            category = ?3,
            created_at = ?4,
            updated_at = ?5
        WHERE id = ?6 AND user_id = ?7
        "#,
    )
    .bind(&current.text)
    .bind(&current.notes)
    .bind(current.category)
    .bind(current.created_at)
    .bind(current.updated_at)
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn set_completed(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let completed_at = completed.then_some(now);
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET completed = ?3,
            completed_at = ?4,
            updated_at = ?5
        WHERE id = ?1 AND user_id = ?2 AND removed = 0
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(completed)
    .bind(completed_at)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn archive_task(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET removed = 1,
            removed_at = ?3,
            updated_at = ?3
        WHERE id = ?1 AND user_id = ?2 AND removed = 0
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Restores an archived task as active and incomplete, keeping its category.
pub async fn restore_task(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET removed = 0,
            removed_at = NULL,
            completed = 0,
            completed_at = NULL,
            updated_at = ?3
        WHERE id = ?1 AND user_id = ?2 AND removed = 1
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Archives the given active tasks in one statement.
pub async fn archive_tasks(
    db: &SqlitePool,
    user_id: &str,
    ids: &[TaskId],
    at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tasks SET removed = 1, removed_at = ");
    qb.push_bind(at);
    qb.push(", updated_at = ");
    qb.push_bind(at);
    qb.push(" WHERE user_id = ");
    qb.push_bind(user_id);
    qb.push(" AND removed = 0");
    push_id_list(&mut qb, ids);

    Ok(qb.build().execute(db).await?.rows_affected())
}

/// Moves the given active tasks to `target`. The deadline clock restarts at
/// `at` unless the target is `Others`.
pub async fn recategorize_tasks(
    db: &SqlitePool,
    user_id: &str,
    ids: &[TaskId],
    target: Category,
    at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tasks SET category = ");
    qb.push_bind(target);
    if target != Category::Others {
        qb.push(", created_at = ");
        qb.push_bind(at);
    }
    qb.push(", updated_at = ");
    qb.push_bind(at);
    qb.push(" WHERE user_id = ");
    qb.push_bind(user_id);
    qb.push(" AND removed = 0");
    push_id_list(&mut qb, ids);

    Ok(qb.build().execute(db).await?.rows_affected())
}

pub async fn delete_tasks(
    db: &SqlitePool,
    user_id: &str,
    ids: &[TaskId],
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM tasks WHERE user_id = ");
    qb.push_bind(user_id);
    push_id_list(&mut qb, ids);

    Ok(qb.build().execute(db).await?.rows_affected())
}

pub async fn delete_all_tasks(db: &SqlitePool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE user_id = ?1")
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result)
}

/// Users owning at least one active task.
pub async fn fetch_user_ids(db: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT user_id FROM tasks WHERE removed = 0 ORDER BY user_id")
        .fetch_all(db)
        .await
}
