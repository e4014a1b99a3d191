// printwatch_shared: report model, print state and collaborator traits shared by the service and its tools

pub mod backends;
pub mod config;
pub mod print_job;
pub mod report;

pub use backends::{Notifier, PrintEventLog, PrintStateStore, SettingsStore, StatusCache, StoreError};
pub use print_job::{CurrentPrint, JobState, PrintChange, PrintEventKind, PrintStamp};
pub use report::{EventType, Report, ReportError, StatusReport};

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};

// --- Time ---

/// Source of "now" for reconciliation. Injected so debounce windows and
/// timestamps are deterministic under test and replay.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
