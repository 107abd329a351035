pub mod lifecycle_service;
pub mod scheduler;

pub use lifecycle_service::LifecycleService;
pub use scheduler::{PassStats, ReconcileScheduler};
