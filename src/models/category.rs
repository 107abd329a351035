use std::fmt;

use serde::{Deserialize, Serialize};

/// The four buckets a task can live in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Category {
    Today,
    ThisWeek,
    NextWeek,
    Others,
}

/// Display metadata for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub category: Category,
    pub label: &'static str,
    pub emoji: &'static str,
    pub rule: &'static str,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Today,
        Category::ThisWeek,
        Category::NextWeek,
        Category::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Today => "today",
            Category::ThisWeek => "this_week",
            Category::NextWeek => "next_week",
            Category::Others => "others",
        }
    }

    pub fn info(self) -> CategoryInfo {
        let (label, emoji, rule) = match self {
            Category::Today => (
                "Today",
                "🔴",
                "Overdue after the day it was added. Archived the day after completion.",
            ),
            Category::ThisWeek => (
                "This Week",
                "🟠",
                "Overdue after Sunday. Archived after the week it was completed in.",
            ),
            Category::NextWeek => (
                "Next Week",
                "🟣",
                "Moves to This Week once the week it was added in ends.",
            ),
            Category::Others => ("Others", "🔵", "No deadline. Stays until you act on it."),
        };

        CategoryInfo {
            category: self,
            label,
            emoji,
            rule,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
