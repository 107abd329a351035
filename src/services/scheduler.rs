use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::lifecycle::Mode;
use crate::services::LifecycleService;

/// Totals for one scheduler pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub users: usize,
    pub archived: usize,
    pub recategorized: usize,
    pub failed: usize,
    pub skipped: bool,
}

/// Periodically commits lifecycle transitions for every user with active
/// tasks, so tasks move on even when nobody opens the list.
pub struct ReconcileScheduler {
    service: Arc<LifecycleService>,
    interval: Duration,
}

impl ReconcileScheduler {
    pub fn new(service: Arc<LifecycleService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Runs passes forever. Errors are logged and the loop carries on.
    pub async fn start(self) {
        info!("Starting reconcile scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.run_pass().await {
                Ok(stats) if stats.skipped => {
                    debug!("Reconcile pass skipped while the clock is simulated");
                }
                Ok(stats) => {
                    info!(
                        "Reconcile pass completed - {} users | archived: {}, recategorized: {}, failed: {}",
                        stats.users, stats.archived, stats.recategorized, stats.failed
                    );
                }
                Err(e) => {
                    warn!("Reconcile pass failed: {:?}", e);
                }
            }
        }
    }

    /// One commit pass over all users. Does nothing under simulated time.
    pub async fn run_pass(&self) -> Result<PassStats, AppError> {
        if self.service.mode() == Mode::Render {
            return Ok(PassStats {
                skipped: true,
                ..PassStats::default()
            });
        }

        let mut stats = PassStats::default();
        for user_id in self.service.store().list_user_ids().await? {
            match self.service.refresh(&user_id).await {
                Ok(outcome) => {
                    stats.users += 1;
                    stats.archived += outcome.report.archived.len();
                    stats.recategorized += outcome.report.recategorized.len();
                    stats.failed += outcome.report.failed.len();
                }
                Err(e) => {
                    warn!(user_id = %user_id, "Reconcile failed for user: {:?}", e);
                }
            }
        }

        Ok(stats)
    }
}
