//! Print reconciliation for agents that send `current_print_ts`.
//!
//! The agent's print start timestamp identifies the print, so there is
//! nothing to debounce: a new timestamp is a new print, the same timestamp is
//! the same print, and explicit events adjust it in place.

use chrono::{DateTime, Utc};
use printwatch_shared::report::{EventType, PrintMarker, TimestampedReport};
use printwatch_shared::{CurrentPrint, PrintChange, PrintEventKind};

use super::Reconciliation;

/// File name for the print: the event's, then the polled job's, else empty.
pub fn current_filename(report: &TimestampedReport) -> String {
    report
        .event
        .as_ref()
        .and_then(|event| event.file_name())
        .or_else(|| {
            report
                .snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.job_file_name.as_deref())
        })
        .unwrap_or_default()
        .to_string()
}

pub fn reconcile(
    printer_id: &str,
    report: &TimestampedReport,
    current: Option<CurrentPrint>,
    now: DateTime<Utc>,
) -> Reconciliation {
    let (ext_id, started_at) = match report.marker {
        PrintMarker::Active { ext_id, started_at } => (ext_id, started_at),
        PrintMarker::NotPrinting => {
            return match current {
                Some(print) => {
                    tracing::info!("Print '{}' on printer {} ended", print.file_name, printer_id);
                    Reconciliation::commit(PrintChange { current: None, retired: Some(print.close(now, false)) })
                }
                None => Reconciliation::unchanged(),
            };
        }
    };

    let (mut print, retired) = match current {
        Some(print) if print.started_at == started_at => {
            if print.is_cancelled() {
                tracing::debug!("Print '{}' on printer {} is already cancelled", print.file_name, printer_id);
                return Reconciliation::unchanged();
            }
            let mut print = print;
            print.touch(now);
            (print, None)
        }
        previous => {
            let file_name = current_filename(report);
            if let Some(old) = &previous {
                tracing::warn!(
                    "Print '{}' on printer {} superseded by print started at {}",
                    old.file_name,
                    printer_id,
                    started_at
                );
            }
            tracing::info!("Print '{}' started on printer {} at {}", file_name, printer_id, started_at);
            let print = CurrentPrint::new(printer_id, &file_name, started_at, now).with_ext_id(ext_id);
            (print, previous.map(|old| old.close(now, false)))
        }
    };

    let mut events = Vec::new();
    if let Some(event_type) = report.event.as_ref().and_then(|event| event.event_type.as_ref()) {
        match event_type {
            EventType::PrintCancelled => {
                tracing::info!("Print '{}' on printer {} cancelled", print.file_name, printer_id);
                print.cancel(now);
            }
            EventType::PrintPaused => {
                print.pause(now);
                events.push(PrintEventKind::Paused);
            }
            EventType::PrintResumed => {
                print.resume();
                events.push(PrintEventKind::Resumed);
            }
            _ => {}
        }
    }

    Reconciliation {
        change: Some(PrintChange { current: Some(print), retired }),
        events,
    }
}
