use std::sync::Arc;

use sqlx::SqlitePool;

use crate::clock::{Clock, SimulatedClock, SystemClock};
use crate::config::AppConfig;
use crate::db::{SqliteTaskStore, TaskStore};
use crate::lifecycle::{Evaluator, Planner};
use crate::services::LifecycleService;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Clock the lifecycle reads; may be time-travelled.
    pub clock: Arc<SimulatedClock>,
    /// Clock stamped onto user writes; never simulated.
    pub wall_clock: Arc<dyn Clock>,
    pub lifecycle: Arc<LifecycleService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig) -> Self {
        Self::with_wall_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_wall_clock(db: SqlitePool, config: AppConfig, wall_clock: Arc<dyn Clock>) -> Self {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::new(db.clone()));
        let clock = Arc::new(SimulatedClock::new(wall_clock.clone()));
        let planner = Planner::new(Evaluator::new(config.calendar));
        let lifecycle = Arc::new(LifecycleService::new(
            store,
            clock.clone(),
            planner,
            config.batch_size,
        ));

        Self {
            db,
            clock,
            wall_clock,
            lifecycle,
            config: Arc::new(config),
        }
    }
}
