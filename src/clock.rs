use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// One read of a clock: the instant and whether it was operator-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub now: DateTime<Utc>,
    pub simulated: bool,
}

impl Reading {
    pub fn real(now: DateTime<Utc>) -> Self {
        Self {
            now,
            simulated: false,
        }
    }
}

/// Source of "now" for everything that reasons about time.
///
/// Anything that needs both the instant and the simulated flag must take
/// them from a single [`Clock::reading`].
pub trait Clock: Send + Sync {
    fn reading(&self) -> Reading;

    fn now(&self) -> DateTime<Utc> {
        self.reading().now
    }

    /// True while the clock reports an operator-set instant.
    fn is_simulated(&self) -> bool {
        self.reading().simulated
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn reading(&self) -> Reading {
        Reading::real(Utc::now())
    }
}

/// A real-time clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn reading(&self) -> Reading {
        Reading::real(self.0)
    }
}

/// Wall clock with an optional time-travel override.
pub struct SimulatedClock {
    real: Arc<dyn Clock>,
    simulated: RwLock<Option<DateTime<Utc>>>,
}

impl SimulatedClock {
    pub fn new(real: Arc<dyn Clock>) -> Self {
        Self {
            real,
            simulated: RwLock::new(None),
        }
    }

    /// A clock frozen at `at`, mostly useful in tests.
    pub fn at(at: DateTime<Utc>) -> Self {
        let clock = Self::new(Arc::new(SystemClock));
        clock.set(Some(at));
        clock
    }

    pub fn simulated(&self) -> Option<DateTime<Utc>> {
        *self.simulated.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn real_now(&self) -> DateTime<Utc> {
        self.real.now()
    }

    /// `None` goes back to real time.
    pub fn set(&self, at: Option<DateTime<Utc>>) {
        let mut slot = self.simulated.write().unwrap_or_else(|e| e.into_inner());
        *slot = at;
        match at {
            Some(at) => info!(simulated = %at, "clock override set"),
            None => info!("clock override cleared"),
        }
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Moves the clock from its current reading and returns the new simulated
    /// instant. Starts from real time when no override is set. `None`, with
    /// the clock untouched, when the result is out of range.
    pub fn advance(&self, delta: Duration) -> Option<DateTime<Utc>> {
        let mut slot = self.simulated.write().unwrap_or_else(|e| e.into_inner());
        let base = slot.unwrap_or_else(|| self.real.now());
        let next = base.checked_add_signed(delta)?;
        *slot = Some(next);
        info!(simulated = %next, "clock advanced");
        Some(next)
    }

    pub fn advance_days(&self, days: i64) -> Option<DateTime<Utc>> {
        self.advance(Duration::try_days(days)?)
    }
}

impl Clock for SimulatedClock {
    fn reading(&self) -> Reading {
        let slot = self.simulated.read().unwrap_or_else(|e| e.into_inner());
        match *slot {
            Some(now) => Reading {
                now,
                simulated: true,
            },
            None => Reading::real(self.real.now()),
        }
    }
}
