use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::db::TaskStore;
use crate::error::AppError;
use crate::lifecycle::{Mode, Planner, Reconciler, Reconciliation, Verdict};
use crate::models::{ArchiveQuery, Task};

/// Wires the clock and the store into the reconciler for one user at a time.
pub struct LifecycleService {
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        planner: Planner,
        batch_size: usize,
    ) -> Self {
        Self {
            clock,
            reconciler: Reconciler::new(store, planner).with_batch_size(batch_size),
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::for_clock(self.clock.as_ref())
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        self.reconciler.store()
    }

    /// Snapshots the user's active tasks and reconciles them against one
    /// reading of the clock.
    pub async fn refresh(&self, user_id: &str) -> Result<Reconciliation, AppError> {
        let tasks = self.store().list_active_tasks(user_id).await?;
        let reading = self.clock.reading();
        let mode = Mode::for_reading(reading);
        Ok(self
            .reconciler
            .reconcile(user_id, tasks, reading.now, mode)
            .await)
    }

    /// Verdict for one of the user's tasks, with the instant it was taken at.
    /// `None` when the task does not exist.
    pub async fn verdict(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<(DateTime<Utc>, Verdict)>, AppError> {
        let task = self.store().find_task(user_id, id).await?;
        let now = self.clock.now();
        let evaluator = self.reconciler.planner().evaluator();
        Ok(task.map(|t| (now, evaluator.evaluate(&t, now))))
    }

    /// Tasks the simulated clock would archive, newest first. Empty under
    /// real time, where they have already been committed.
    pub async fn projected_archive(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        if self.mode() == Mode::Commit {
            return Ok(Vec::new());
        }
        // The override may be cleared meanwhile; trust the pass's own mode.
        let outcome = self.refresh(user_id).await?;
        if outcome.mode == Mode::Commit {
            return Ok(Vec::new());
        }
        Ok(outcome.view.archived)
    }

    /// Projected archive narrowed to tasks whose text or notes contain
    /// `search`, case-insensitively.
    pub async fn projected_archive_matching(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Task>, AppError> {
        let mut projected = self.projected_archive(user_id).await?;
        if let Some(term) = search {
            let term = term.to_lowercase();
            projected.retain(|t| matches_search(t, &term));
        }
        Ok(projected)
    }

    /// One page of the archive. Under simulated time the first page leads
    /// with the tasks the projection archives.
    pub async fn archived(
        &self,
        user_id: &str,
        query: &ArchiveQuery,
    ) -> Result<Vec<Task>, AppError> {
        let page = self.store().list_archived_tasks(user_id, query).await?;
        if query.page_offset > 0 {
            return Ok(page);
        }

        let mut projected = self
            .projected_archive_matching(user_id, query.search_term())
            .await?;
        if !projected.is_empty() {
            debug!(user_id, projected = projected.len(), "prefixing projected archive");
        }

        projected.extend(page);
        Ok(projected)
    }
}

fn matches_search(task: &Task, lowercase_term: &str) -> bool {
    task.text.to_lowercase().contains(lowercase_term)
        || task
            .notes
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(lowercase_term))
}
