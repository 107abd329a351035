use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::evaluator::{Evaluator, Transition};
use super::planner::{Plan, Planner, batches};
use crate::clock::{Clock, Reading};
use crate::db::{DEFAULT_BATCH_SIZE, TaskStore};
use crate::models::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Write the plan to storage.
    Commit,
    /// Project the plan in memory only.
    Render,
}

impl Mode {
    /// Real time commits, simulated time only renders.
    pub fn for_reading(reading: Reading) -> Self {
        if reading.simulated {
            Mode::Render
        } else {
            Mode::Commit
        }
    }

    pub fn for_clock(clock: &dyn Clock) -> Self {
        Self::for_reading(clock.reading())
    }
}

/// Ids written during a commit pass. Ids in `failed` are retried by the next
/// pass, which re-derives them from stored state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub archived: Vec<TaskId>,
    pub recategorized: Vec<TaskId>,
    pub failed: Vec<TaskId>,
}

impl CommitReport {
    pub fn committed_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.archived.iter().chain(self.recategorized.iter())
    }

    pub fn committed_count(&self) -> usize {
        self.archived.len() + self.recategorized.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub is_overdue: bool,
}

/// Task lists as they look once a plan has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectedView {
    pub active: Vec<TaskView>,
    /// Tasks archived by this pass, stamped with the pass's `now`.
    pub archived: Vec<Task>,
}

impl ProjectedView {
    pub fn find(&self, id: &str) -> Option<&TaskView> {
        self.active.iter().find(|v| v.task.id == id)
    }

    pub fn is_archived(&self, id: &str) -> bool {
        self.archived.iter().any(|t| t.id == id)
    }
}

/// Applies `plan` to `tasks` in memory. Archived tasks in the input are
/// dropped from the view.
pub fn project(
    evaluator: &Evaluator,
    tasks: Vec<Task>,
    plan: &Plan,
    now: DateTime<Utc>,
) -> ProjectedView {
    let mut transitions: HashMap<&str, Transition> = plan
        .to_archive
        .iter()
        .map(|id| (id.as_str(), Transition::Archive))
        .collect();
    for (target, ids) in &plan.to_recategorize {
        for id in ids {
            transitions.insert(id.as_str(), Transition::Recategorize(*target));
        }
    }

    let mut view = ProjectedView::default();
    for mut task in tasks.into_iter().filter(Task::is_active) {
        match transitions.get(task.id.as_str()) {
            Some(Transition::Archive) => {
                task.archive(now);
                view.archived.push(task);
                continue;
            }
            Some(Transition::Recategorize(target)) => {
                task.move_to(*target, now);
            }
            None => {}
        }
        let is_overdue = evaluator.is_overdue(&task, now);
        view.active.push(TaskView { task, is_overdue });
    }

    view
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub mode: Mode,
    pub now: DateTime<Utc>,
    pub plan: Plan,
    pub report: CommitReport,
    pub view: ProjectedView,
}

/// Runs the planner and then either commits the plan or renders it. Both
/// modes share the same plan; only the effect differs.
pub struct Reconciler {
    store: Arc<dyn TaskStore>,
    planner: Planner,
    batch_size: usize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TaskStore>, planner: Planner) -> Self {
        Self {
            store,
            planner,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Reconciles one user's active-task snapshot against a single `now`.
    pub async fn reconcile(
        &self,
        user_id: &str,
        tasks: Vec<Task>,
        now: DateTime<Utc>,
        mode: Mode,
    ) -> Reconciliation {
        let plan = self.planner.plan(&tasks, now);
        debug!(
            user_id,
            ?mode,
            archive = plan.to_archive.len(),
            recategorize = plan.recategorize_count(),
            "planned lifecycle transitions"
        );

        let (report, applied) = match mode {
            Mode::Render => (CommitReport::default(), plan.clone()),
            Mode::Commit if plan.is_empty() => (CommitReport::default(), Plan::default()),
            Mode::Commit => {
                let report = self.commit(user_id, &plan, now).await;
                let failed: HashSet<&str> = report.failed.iter().map(String::as_str).collect();
                let mut applied = plan.clone();
                applied.retain(|id| !failed.contains(id));
                (report, applied)
            }
        };

        let view = project(self.planner.evaluator(), tasks, &applied, now);

        Reconciliation {
            mode,
            now,
            plan,
            report,
            view,
        }
    }

    async fn commit(&self, user_id: &str, plan: &Plan, now: DateTime<Utc>) -> CommitReport {
        let mut report = CommitReport::default();

        for batch in batches(&plan.to_archive, self.batch_size) {
            match self.store.apply_archive(user_id, batch, now).await {
                Ok(_) => report.archived.extend_from_slice(batch),
                Err(e) => {
                    warn!(user_id, ids = batch.len(), "archive batch failed: {}", e);
                    report.failed.extend_from_slice(batch);
                }
            }
        }

        for (target, ids) in &plan.to_recategorize {
            for batch in batches(ids, self.batch_size) {
                match self.store.apply_recategorize(user_id, batch, *target, now).await {
                    Ok(_) => report.recategorized.extend_from_slice(batch),
                    Err(e) => {
                        warn!(
                            user_id,
                            ids = batch.len(),
                            %target,
                            "recategorize batch failed: {}",
                            e
                        );
                        report.failed.extend_from_slice(batch);
                    }
                }
            }
        }

        info!(
            user_id,
            archived = report.archived.len(),
            recategorized = report.recategorized.len(),
            failed = report.failed.len(),
            "committed lifecycle plan"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::Category;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    #[test]
    fn projection_moves_archives_and_flags_overdue() {
        let mut done = Task::new("u1", "done", Category::Today, utc(1, 9));
        done.set_completed(true, utc(1, 12));
        let stale_next = Task::new("u1", "stale next", Category::NextWeek, utc(3, 9));
        let late = Task::new("u1", "late", Category::Today, utc(5, 9));
        let tasks = vec![done.clone(), stale_next.clone(), late.clone()];

        let now = utc(8, 12);
        let planner = Planner::default();
        let plan = planner.plan(&tasks, now);
        let view = project(planner.evaluator(), tasks, &plan, now);

        assert!(view.is_archived(&done.id));
        assert_eq!(view.archived[0].removed_at, Some(now));

        let moved = view.find(&stale_next.id).unwrap();
        assert_eq!(moved.task.category, Category::ThisWeek);
        assert_eq!(moved.task.created_at, now);
        assert!(!moved.is_overdue);

        assert!(view.find(&late.id).unwrap().is_overdue);
        assert_eq!(view.active.len(), 2);
    }

    #[test]
    fn mode_follows_the_clock() {
        let clock = crate::clock::SimulatedClock::new(Arc::new(crate::clock::SystemClock));
        assert_eq!(Mode::for_clock(&clock), Mode::Commit);
        clock.advance_days(1);
        assert_eq!(Mode::for_clock(&clock), Mode::Render);
    }
}
