use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Category;

pub type TaskId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: TaskId,
    pub user_id: String,
    pub text: String,
    pub notes: Option<String>,
    pub category: Category,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub removed: bool,
    pub removed_at: Option<DateTime<Utc>>,
    /// Instant the task entered its current category.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        user_id: impl Into<String>,
        text: impl Into<String>,
        category: Category,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            text: text.into(),
            notes: None,
            category,
            completed: false,
            completed_at: None,
            removed: false,
            removed_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }

    /// `completed_at` always follows `completed`.
    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(at);
        self.updated_at = at;
    }

    /// Moves the task to `target`, restarting its deadline clock unless the
    /// target is `Others`. Returns false when the task is already there.
    pub fn move_to(&mut self, target: Category, at: DateTime<Utc>) -> bool {
        if self.category == target {
            return false;
        }
        self.category = target;
        if target != Category::Others {
            self.created_at = at;
        }
        self.updated_at = at;
        true
    }

    pub fn archive(&mut self, at: DateTime<Utc>) {
        self.removed = true;
        self.removed_at = Some(at);
        self.updated_at = at;
    }

    /// Brings an archived task back as active and incomplete.
    pub fn restore(&mut self, at: DateTime<Utc>) {
        self.removed = false;
        self.removed_at = None;
        self.completed = false;
        self.completed_at = None;
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub text: String,
    pub category: Category,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub text: Option<String>,
    pub notes: Option<String>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdsRequest {
    pub ids: Vec<TaskId>,
}

pub const DEFAULT_ARCHIVE_PAGE_SIZE: i64 = 20;

fn default_page_size() -> i64 {
    DEFAULT_ARCHIVE_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub page_offset: i64,
}

impl Default for ArchiveQuery {
    fn default() -> Self {
        Self {
            search: None,
            page_size: DEFAULT_ARCHIVE_PAGE_SIZE,
            page_offset: 0,
        }
    }
}

impl ArchiveQuery {
    /// Trimmed search text, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    #[test]
    fn completion_stamp_follows_flag() {
        let mut task = Task::new("u1", "write report", Category::Today, at(1, 9));

        task.set_completed(true, at(1, 14));
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(at(1, 14)));

        task.set_completed(false, at(1, 15));
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn archive_then_restore_clears_state_and_keeps_category() {
        let mut task = Task::new("u1", "pay rent", Category::ThisWeek, at(1, 9));
        task.set_completed(true, at(2, 9));
        task.archive(at(8, 0));
        assert!(task.removed);
        assert_eq!(task.removed_at, Some(at(8, 0)));

        task.restore(at(9, 0));
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
        assert!(!task.removed);
        assert_eq!(task.removed_at, None);
        assert_eq!(task.category, Category::ThisWeek);
    }

    #[test]
    fn moving_resets_created_at_except_into_others() {
        let mut task = Task::new("u1", "call mom", Category::NextWeek, at(1, 9));

        assert!(task.move_to(Category::ThisWeek, at(8, 0)));
        assert_eq!(task.created_at, at(8, 0));

        assert!(task.move_to(Category::Others, at(9, 0)));
        assert_eq!(task.created_at, at(8, 0));

        assert!(!task.move_to(Category::Others, at(10, 0)));
        assert_eq!(task.updated_at, at(9, 0));
    }

    #[test]
    fn archive_query_ignores_blank_search() {
        let query = ArchiveQuery {
            search: Some("   ".to_string()),
            ..ArchiveQuery::default()
        };
        assert_eq!(query.search_term(), None);
    }
}
