//! Print detection for agents that do not send `current_print_ts`.
//!
//! An explicit start/done/cancel event with a file name always wins. Without
//! one we fall back to the polled state flags, but only once the current
//! print has been quiet for the debounce window: the polled snapshot and the
//! event stream come from different places in the agent and can disagree for
//! a short while after a state change.

use chrono::{DateTime, Duration, Utc};
use printwatch_shared::report::{EventType, LegacyReport};
use printwatch_shared::{CurrentPrint, PrintChange};

use super::Reconciliation;

pub const DEBOUNCE_WINDOW_SECS: i64 = 60;

/// Outcome of classifying one legacy report.
///
/// `is_printing == None` means no determination: leave the printer alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub file_name: Option<String>,
    pub is_printing: Option<bool>,
    pub was_cancelled: bool,
}

impl Classification {
    pub fn undetermined() -> Self {
        Self::default()
    }

    fn from_event(file_name: &str, is_printing: bool, was_cancelled: bool) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            is_printing: Some(is_printing),
            was_cancelled,
        }
    }
}

pub fn classify(
    report: &LegacyReport,
    current: Option<&CurrentPrint>,
    now: DateTime<Utc>,
    debounce: Duration,
) -> Classification {
    if let Some(event) = &report.event {
        if let Some(name) = event.file_name() {
            match event.event_type {
                Some(EventType::PrintStarted) => return Classification::from_event(name, true, false),
                Some(EventType::PrintDone) => return Classification::from_event(name, false, false),
                Some(EventType::PrintCancelled) => return Classification::from_event(name, false, true),
                _ => {}
            }
        }
    }

    if let Some(print) = current {
        if now - print.updated_at < debounce {
            tracing::debug!(
                "Ignoring polled state for printer {}: current print updated {}s ago",
                print.printer_id,
                (now - print.updated_at).num_seconds()
            );
            return Classification::undetermined();
        }
    }

    let snapshot = report.snapshot.clone().unwrap_or_default();
    // The polled snapshot cannot tell a cancelled job from a finished one.
    Classification {
        file_name: snapshot.job_file_name,
        is_printing: Some(snapshot.flags.any_active()),
        was_cancelled: false,
    }
}

/// Turn a classification into a change to the printer's current print.
pub fn apply(
    printer_id: &str,
    classification: Classification,
    current: Option<CurrentPrint>,
    now: DateTime<Utc>,
) -> Reconciliation {
    match classification.is_printing {
        None => Reconciliation::unchanged(),
        Some(true) => {
            let file_name = classification.file_name.unwrap_or_default();
            match current {
                Some(mut print) if print.file_name == file_name && !print.is_cancelled() => {
                    print.touch(now);
                    Reconciliation::commit(PrintChange { current: Some(print), retired: None })
                }
                previous => {
                    if file_name.is_empty() {
                        tracing::warn!("Printer {} is printing but reported no file name", printer_id);
                    }
                    tracing::info!("Print '{}' started on printer {}", file_name, printer_id);
                    Reconciliation::commit(PrintChange {
                        current: Some(CurrentPrint::new(printer_id, &file_name, now, now)),
                        retired: previous.map(|print| print.close(now, false)),
                    })
                }
            }
        }
        Some(false) => match current {
            Some(print) => {
                tracing::info!(
                    "Print '{}' on printer {} ended{}",
                    print.file_name,
                    printer_id,
                    if classification.was_cancelled { " (cancelled)" } else { "" }
                );
                Reconciliation::commit(PrintChange {
                    current: None,
                    retired: Some(print.close(now, classification.was_cancelled)),
                })
            }
            None => Reconciliation::unchanged(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printwatch_shared::report::{PolledSnapshot, PrintEvent, StateFlags};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn window() -> Duration {
        Duration::seconds(DEBOUNCE_WINDOW_SECS)
    }

    fn event(kind: EventType, name: Option<&str>) -> LegacyReport {
        LegacyReport {
            event: Some(PrintEvent { event_type: Some(kind), file_name: name.map(str::to_string) }),
            snapshot: None,
        }
    }

    #[test]
    fn empty_event_name_falls_through_to_snapshot() {
        let mut report = event(EventType::PrintStarted, Some(""));
        report.snapshot = Some(PolledSnapshot {
            job_file_name: Some("x.gcode".to_string()),
            flags: StateFlags { paused: true, ..StateFlags::default() },
        });
        let c = classify(&report, None, at(1000), window());
        assert_eq!(c.file_name.as_deref(), Some("x.gcode"));
        assert_eq!(c.is_printing, Some(true));
    }

    #[test]
    fn pause_event_is_not_a_determination() {
        let report = event(EventType::PrintPaused, Some("a.gcode"));
        let current = CurrentPrint::new("p1", "a.gcode", at(900), at(990));
        assert_eq!(classify(&report, Some(&current), at(1000), window()), Classification::undetermined());
    }

    #[test]
    fn debounce_expires_at_window() {
        let current = CurrentPrint::new("p1", "a.gcode", at(900), at(940));
        let c = classify(&LegacyReport::default(), Some(&current), at(1000), window());
        assert_eq!(c.is_printing, Some(false));
    }

    #[test]
    fn no_snapshot_means_not_printing() {
        let c = classify(&LegacyReport::default(), None, at(1000), window());
        assert_eq!(c, Classification { file_name: None, is_printing: Some(false), was_cancelled: false });
    }

    #[test]
    fn same_file_continues_print() {
        let current = CurrentPrint::new("p1", "a.gcode", at(900), at(900));
        let id = current.id;
        let c = Classification { file_name: Some("a.gcode".to_string()), is_printing: Some(true), was_cancelled: false };
        let change = apply("p1", c, Some(current), at(1000)).change.unwrap();
        let print = change.current.unwrap();
        assert_eq!(print.id, id);
        assert_eq!(print.updated_at, at(1000));
        assert!(change.retired.is_none());
    }

    #[test]
    fn different_file_replaces_print() {
        let current = CurrentPrint::new("p1", "a.gcode", at(900), at(900));
        let old_id = current.id;
        let c = Classification { file_name: Some("b.gcode".to_string()), is_printing: Some(true), was_cancelled: false };
        let change = apply("p1", c, Some(current), at(1000)).change.unwrap();
        let print = change.current.unwrap();
        assert_ne!(print.id, old_id);
        assert_eq!(print.file_name, "b.gcode");
        assert_eq!(print.started_at, at(1000));
        let retired = change.retired.unwrap();
        assert_eq!(retired.id, old_id);
        assert!(retired.finished);
    }

    #[test]
    fn stop_without_current_print_is_a_no_op() {
        let c = Classification { file_name: None, is_printing: Some(false), was_cancelled: true };
        assert_eq!(apply("p1", c, None, at(1000)), Reconciliation::unchanged());
    }
}
