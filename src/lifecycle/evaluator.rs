use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rules::Calendar;
use crate::models::{Category, Task};

/// Automatic state change the evaluator asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Transition {
    Recategorize(Category),
    Archive,
}

/// What a task looks like at a given instant.
///
/// A single `transition` slot means a task can never be asked to move and to
/// be archived in the same evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_overdue: bool,
    pub transition: Option<Transition>,
}

impl Verdict {
    pub fn recategorize_to(&self) -> Option<Category> {
        match self.transition {
            Some(Transition::Recategorize(target)) => Some(target),
            _ => None,
        }
    }

    pub fn should_archive(&self) -> bool {
        matches!(self.transition, Some(Transition::Archive))
    }

    pub fn is_noop(&self) -> bool {
        self.transition.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluator {
    calendar: Calendar,
}

impl Evaluator {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Evaluates `task` at `now`. Archived tasks and tasks missing the
    /// timestamps a rule needs get a no-op verdict.
    pub fn evaluate(&self, task: &Task, now: DateTime<Utc>) -> Verdict {
        if !task.is_active() {
            return Verdict::default();
        }

        Verdict {
            is_overdue: self.is_overdue(task, now),
            transition: self.transition(task, now),
        }
    }

    pub fn is_overdue(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if !task.is_active() || task.completed {
            return false;
        }
        self.calendar
            .overdue_deadline(task.category, task.created_at)
            .is_some_and(|deadline| now > deadline)
    }

    fn transition(&self, task: &Task, now: DateTime<Utc>) -> Option<Transition> {
        if !task.completed {
            let deadline = self
                .calendar
                .transition_deadline(task.category, task.created_at)?;
            // NextWeek is the only category with a transition deadline.
            return (now > deadline).then_some(Transition::Recategorize(Category::ThisWeek));
        }

        let completed_at = task.completed_at?;
        let deadline = self.calendar.archive_deadline(task.category, completed_at)?;
        (now > deadline).then_some(Transition::Archive)
    }
}
