//! Status ingestion entry point.
//!
//! One call handles one report: validate it, write settings and the status
//! snapshot, reconcile the current print under a per-printer lock, commit
//! with compare-and-set, record print events and notify observers once.

use printwatch_shared::config::IngestConfig;
use printwatch_shared::{
    Clock, CurrentPrint, Notifier, PrintEventKind, PrintEventLog, PrintStateStore, Report,
    ReportError, SettingsStore, StatusCache, StatusReport, StoreError,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::normalizer;
use crate::reconcile::{Reconciliation, legacy, timestamped};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Rejected report: {0}")]
    Report(#[from] ReportError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Every collaborator the entry point writes through.
#[derive(Clone)]
pub struct Backends {
    pub prints: Arc<dyn PrintStateStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub status: Arc<dyn StatusCache>,
    pub events: Arc<dyn PrintEventLog>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Legacy,
    Timestamped,
}

/// What processing one report did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub printer_id: String,
    pub protocol: Protocol,
    /// Whether the printer's print state was written.
    pub changed: bool,
    pub current_print: Option<CurrentPrint>,
    pub events: Vec<PrintEventKind>,
}

type PrinterLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct StatusIngestor {
    backends: Backends,
    clock: Arc<dyn Clock>,
    config: IngestConfig,
    printer_locks: PrinterLocks,
}

/// Holds one printer's reconciliation lock. Dropping it releases the lock and
/// evicts the map entry once no other report for that printer holds or waits
/// on it.
struct PrinterLockGuard<'a> {
    locks: &'a PrinterLocks,
    printer_id: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PrinterLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(self.printer_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(self.printer_id);
        }
    }
}

impl StatusIngestor {
    pub fn new(backends: Backends, clock: Arc<dyn Clock>, config: IngestConfig) -> Self {
        Self {
            backends,
            clock,
            config,
            printer_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Validate and process a raw JSON report. A malformed report is rejected
    /// before anything is written.
    pub async fn ingest(&self, printer_id: &str, raw: Value) -> Result<IngestOutcome, IngestError> {
        let report = StatusReport::from_value(raw).map_err(|e| {
            tracing::warn!("Rejected status report from printer {}: {}", printer_id, e);
            e
        })?;
        self.ingest_report(printer_id, report).await
    }

    pub async fn ingest_report(&self, printer_id: &str, report: StatusReport) -> Result<IngestOutcome, IngestError> {
        if let Some(webcam) = &report.webcam_settings {
            self.backends.settings.set(printer_id, normalizer::settings_dict(webcam)).await?;
        }

        let status = normalizer::status_snapshot(&report.raw);
        self.backends.status.set(printer_id, status, self.config.status_ttl()).await?;

        let protocol = match report.report {
            Report::Legacy(_) => Protocol::Legacy,
            Report::Timestamped(_) => Protocol::Timestamped,
        };

        let (current_print, changed, events) = {
            let _guard = self.lock_printer(printer_id).await;
            self.reconcile_and_commit(printer_id, &report.report).await?
        };

        if let Some(print) = &current_print {
            for kind in &events {
                self.backends.events.record(print, *kind).await?;
            }
        }

        self.backends.notifier.notify(printer_id).await?;

        Ok(IngestOutcome {
            printer_id: printer_id.to_string(),
            protocol,
            changed,
            current_print,
            events,
        })
    }

    async fn reconcile_and_commit(
        &self,
        printer_id: &str,
        report: &Report,
    ) -> Result<(Option<CurrentPrint>, bool, Vec<PrintEventKind>), IngestError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.backends.prints.load(printer_id).await?;
            let expected = current.as_ref().map(CurrentPrint::stamp);
            let now = self.clock.now();

            let Reconciliation { change, events } = match report {
                Report::Legacy(legacy_report) => {
                    let classification = legacy::classify(
                        legacy_report,
                        current.as_ref(),
                        now,
                        self.config.debounce_window(),
                    );
                    tracing::debug!("Printer {} legacy classification: {:?}", printer_id, classification);
                    legacy::apply(printer_id, classification, current.clone(), now)
                }
                Report::Timestamped(ts_report) => {
                    timestamped::reconcile(printer_id, ts_report, current.clone(), now)
                }
            };

            let Some(change) = change else {
                return Ok((current, false, events));
            };
            let resulting = change.current.clone();

            match self.backends.prints.commit(printer_id, expected, change).await {
                Ok(()) => return Ok((resulting, true, events)),
                Err(StoreError::Conflict { .. }) if attempt < self.config.commit_attempts => {
                    tracing::warn!(
                        "Current print for printer {} changed during reconciliation, retrying ({}/{})",
                        printer_id,
                        attempt,
                        self.config.commit_attempts
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn lock_printer<'a>(&'a self, printer_id: &'a str) -> PrinterLockGuard<'a> {
        let lock = {
            let mut locks = self.printer_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(printer_id.to_string()).or_default().clone()
        };
        let mut held = PrinterLockGuard { locks: &self.printer_locks, printer_id, guard: None };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn tracked_printers(&self) -> usize {
        self.printer_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
