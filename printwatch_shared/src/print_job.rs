use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a print is in its lifecycle, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Printing,
    Paused,
    Completed,
    Cancelled,
}

/// A printer's record of its in-progress or most recently active print.
///
/// Once `cancelled_at` is set the record is terminal: reconciliation never
/// mutates it again, it can only be retired into history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPrint {
    pub id: Uuid,
    pub printer_id: String,
    pub file_name: String,
    /// Agent-side print timestamp; `None` for prints detected by the legacy protocol.
    pub ext_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub finished: bool,
}

impl CurrentPrint {
    pub fn new(printer_id: &str, file_name: &str, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            printer_id: printer_id.to_string(),
            file_name: file_name.to_string(),
            ext_id: None,
            started_at,
            updated_at: now,
            paused_at: None,
            cancelled_at: None,
            finished: false,
        }
    }

    pub fn with_ext_id(mut self, ext_id: i64) -> Self {
        self.ext_id = Some(ext_id);
        self
    }

    pub fn stamp(&self) -> PrintStamp {
        PrintStamp { id: self.id, updated_at: self.updated_at }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    pub fn state(&self) -> JobState {
        if self.cancelled_at.is_some() {
            JobState::Cancelled
        } else if self.finished {
            JobState::Completed
        } else if self.paused_at.is_some() {
            JobState::Paused
        } else {
            JobState::Printing
        }
    }

    /// Advance `updated_at`. It never moves backwards, even if `now` does.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.paused_at = Some(now);
    }

    pub fn resume(&mut self) {
        self.paused_at = None;
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.cancelled_at = Some(now);
        self.paused_at = None;
    }

    /// End the lifecycle of this print before it is retired into history.
    /// A cancelled print is left exactly as it was.
    pub fn close(mut self, now: DateTime<Utc>, cancelled: bool) -> Self {
        if self.is_cancelled() {
            return self;
        }
        if cancelled {
            self.cancel(now);
        } else {
            self.finished = true;
            self.paused_at = None;
        }
        self.touch(now);
        self
    }
}

/// Identity of a stored current print, used for compare-and-set commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintStamp {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Result of one reconciliation, to be committed to the print state store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintChange {
    /// New value of the printer's current print slot.
    pub current: Option<CurrentPrint>,
    /// The print this change replaced or closed, if any.
    pub retired: Option<CurrentPrint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintEventKind {
    Paused,
    Resumed,
}

impl fmt::Display for PrintEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintEventKind::Paused => write!(f, "PAUSED"),
            PrintEventKind::Resumed => write!(f, "RESUMED"),
        }
    }
}
