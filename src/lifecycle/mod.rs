//! Time-driven task lifecycle.
//!
//! `rules` turns a category and a reference instant into deadlines,
//! `evaluator` turns one task and `now` into a [`Verdict`], `planner` batches
//! verdicts into a [`Plan`] and `reconciler` commits or renders that plan.
//! Nothing in here reads the system clock; `now` is always passed in.

pub mod evaluator;
pub mod planner;
pub mod reconciler;
pub mod rules;

pub use evaluator::{Evaluator, Transition, Verdict};
pub use planner::{Plan, Planner};
pub use reconciler::{
    CommitReport, Mode, ProjectedView, Reconciler, Reconciliation, TaskView, project,
};
pub use rules::Calendar;
