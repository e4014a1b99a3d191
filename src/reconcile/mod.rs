//! Print-state reconciliation.
//!
//! Both protocol paths are pure functions of (report, current print, now).
//! They return a [`Reconciliation`] describing what to commit; the ingestion
//! entry point owns loading, committing and retrying.

pub mod legacy;
pub mod timestamped;

use printwatch_shared::{PrintChange, PrintEventKind};

/// What one report does to a printer's current print.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// `None` when the report leaves the stored state untouched.
    pub change: Option<PrintChange>,
    /// Print events to record against the resulting current print.
    pub events: Vec<PrintEventKind>,
}

impl Reconciliation {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn commit(change: PrintChange) -> Self {
        Self { change: Some(change), events: Vec::new() }
    }
}
