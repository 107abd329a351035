pub mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{ArchiveQuery, Category, Task, TaskId};

/// Largest number of ids sent in one write.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Storage the lifecycle engine reads snapshots from and commits plans to.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_active_tasks(&self, user_id: &str) -> Result<Vec<Task>, AppError>;

    async fn list_archived_tasks(
        &self,
        user_id: &str,
        query: &ArchiveQuery,
    ) -> Result<Vec<Task>, AppError>;

    async fn find_task(&self, user_id: &str, id: &str) -> Result<Option<Task>, AppError>;

    /// Marks `ids` as archived at `at`. Returns the number of rows changed.
    async fn apply_archive(
        &self,
        user_id: &str,
        ids: &[TaskId],
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Moves `ids` to `target`, restarting their deadline clock at `at`.
    async fn apply_recategorize(
        &self,
        user_id: &str,
        ids: &[TaskId],
        target: Category,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    async fn list_user_ids(&self) -> Result<Vec<String>, AppError>;
}

#[derive(Clone)]
pub struct SqliteTaskStore {
    db: SqlitePool,
}

impl SqliteTaskStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list_active_tasks(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        Ok(repository::fetch_active_tasks(&self.db, user_id).await?)
    }

    async fn list_archived_tasks(
        &self,
        user_id: &str,
        query: &ArchiveQuery,
    ) -> Result<Vec<Task>, AppError> {
        Ok(repository::fetch_archived_tasks(
            &self.db,
            user_id,
            query.search_term(),
            query.page_size,
            query.page_offset,
        )
        .await?)
    }

    async fn find_task(&self, user_id: &str, id: &str) -> Result<Option<Task>, AppError> {
        Ok(repository::find_task_by_id(&self.db, user_id, id).await?)
    }

    async fn apply_archive(
        &self,
        user_id: &str,
        ids: &[TaskId],
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        Ok(repository::archive_tasks(&self.db, user_id, ids, at).await?)
    }

    async fn apply_recategorize(
        &self,
        user_id: &str,
        ids: &[TaskId],
        target: Category,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        Ok(repository::recategorize_tasks(&self.db, user_id, ids, target, at).await?)
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, AppError> {
        Ok(repository::fetch_user_ids(&self.db).await?)
    }
}
