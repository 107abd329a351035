use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::evaluator::{Evaluator, Transition};
use crate::models::{Category, Task, TaskId};

/// Mutations needed to bring stored tasks in line with their verdicts.
///
/// An id shows up at most once across both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub to_archive: Vec<TaskId>,
    pub to_recategorize: BTreeMap<Category, Vec<TaskId>>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.to_archive.is_empty() && self.to_recategorize.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.to_archive.len() + self.recategorize_count()
    }

    pub fn recategorize_count(&self) -> usize {
        self.to_recategorize.values().map(Vec::len).sum()
    }

    pub fn archives(&self, id: &str) -> bool {
        self.to_archive.iter().any(|a| a == id)
    }

    pub fn recategorize_target(&self, id: &str) -> Option<Category> {
        self.to_recategorize
            .iter()
            .find(|(_, ids)| ids.iter().any(|r| r == id))
            .map(|(target, _)| *target)
    }

    /// Keeps only the ids accepted by `keep`, dropping emptied groups.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.to_archive.retain(|id| keep(id));
        for ids in self.to_recategorize.values_mut() {
            ids.retain(|id| keep(id));
        }
        self.to_recategorize.retain(|_, ids| !ids.is_empty());
    }

    fn push(&mut self, id: TaskId, transition: Transition) {
        match transition {
            Transition::Archive => self.to_archive.push(id),
            Transition::Recategorize(target) => {
                self.to_recategorize.entry(target).or_default().push(id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    evaluator: Evaluator,
}

impl Planner {
    pub fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluates every active task against the same `now`. Archived tasks and
    /// repeated ids are skipped.
    pub fn plan<'a>(
        &self,
        tasks: impl IntoIterator<Item = &'a Task>,
        now: DateTime<Utc>,
    ) -> Plan {
        let mut plan = Plan::default();
        let mut seen = HashSet::new();

        for task in tasks {
            if !task.is_active() || !seen.insert(task.id.as_str()) {
                continue;
            }
            if let Some(transition) = self.evaluator.evaluate(task, now).transition {
                plan.push(task.id.clone(), transition);
            }
        }

        plan
    }
}

/// Splits ids into write batches of at most `size` (clamped to at least 1).
pub fn batches(ids: &[TaskId], size: usize) -> std::slice::Chunks<'_, TaskId> {
    ids.chunks(size.max(1))
}
