//! New protocol: prints identified by the agent's start timestamp.

use chrono::{DateTime, Utc};
use printwatch::reconcile::timestamped;
use printwatch_shared::report::{Report, TimestampedReport};
use printwatch_shared::{CurrentPrint, PrintEventKind, StatusReport};
use serde_json::{Value, json};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn timestamped(value: Value) -> TimestampedReport {
    match StatusReport::from_value(value).unwrap().report {
        Report::Timestamped(report) => report,
        Report::Legacy(_) => panic!("expected a timestamped report"),
    }
}

fn print_started_at(ts: i64) -> CurrentPrint {
    CurrentPrint::new("p1", "a.gcode", at(ts), at(ts)).with_ext_id(ts)
}

/// Run a report against `current` and return the resulting current print.
fn step(report: Value, current: Option<CurrentPrint>, now: i64) -> (Option<CurrentPrint>, Vec<PrintEventKind>) {
    let reconciliation = timestamped::reconcile("p1", &timestamped(report), current.clone(), at(now));
    match reconciliation.change {
        Some(change) => (change.current, reconciliation.events),
        None => (current, reconciliation.events),
    }
}

#[test]
fn first_report_creates_print() {
    let (print, events) = step(
        json!({"current_print_ts": 1000, "octoprint_event": {"event_type": "PrintStarted", "name": "a.gcode"}}),
        None,
        1002,
    );
    let print = print.unwrap();
    assert_eq!(print.file_name, "a.gcode");
    assert_eq!(print.started_at, at(1000));
    assert_eq!(print.updated_at, at(1002));
    assert_eq!(print.paused_at, None);
    assert_eq!(print.cancelled_at, None);
    assert!(events.is_empty());
}

#[test]
fn file_name_falls_back_to_polled_job() {
    let (print, _) = step(
        json!({"current_print_ts": 1000, "octoprint_data": {"job": {"file": {"name": "job.gcode"}}}}),
        None,
        1001,
    );
    assert_eq!(print.unwrap().file_name, "job.gcode");
}

#[test]
fn pause_then_resume_round_trip() {
    let current = print_started_at(1000);
    let (paused, events) = step(
        json!({"current_print_ts": 1000, "octoprint_event": {"event_type": "PrintPaused", "name": "a.gcode"}}),
        Some(current.clone()),
        1100,
    );
    let paused = paused.unwrap();
    assert_eq!(paused.id, current.id);
    assert_eq!(paused.paused_at, Some(at(1100)));
    assert_eq!(events, vec![PrintEventKind::Paused]);

    let (resumed, events) = step(
        json!({"current_print_ts": 1000, "octoprint_event": {"event_type": "PrintResumed", "name": "a.gcode"}}),
        Some(paused),
        1200,
    );
    let resumed = resumed.unwrap();
    assert_eq!(resumed.id, current.id);
    assert_eq!(resumed.paused_at, None);
    assert_eq!(resumed.updated_at, at(1200));
    assert_eq!(events, vec![PrintEventKind::Resumed]);
}

#[test]
fn scenario_c_cancel_marks_existing_print() {
    let current = print_started_at(1000);
    let reconciliation = timestamped::reconcile(
        "p1",
        &timestamped(json!({"current_print_ts": 1000, "octoprint_event": {"event_type": "PrintCancelled"}})),
        Some(current.clone()),
        at(1500),
    );
    let change = reconciliation.change.unwrap();
    assert!(change.retired.is_none(), "no new print is created");
    let print = change.current.unwrap();
    assert_eq!(print.id, current.id);
    assert_eq!(print.cancelled_at, Some(at(1500)));
    assert!(reconciliation.events.is_empty());
}

#[test]
fn scenario_d_new_timestamp_supersedes_print() {
    let current = print_started_at(1000);
    let reconciliation = timestamped::reconcile(
        "p1",
        &timestamped(json!({"current_print_ts": 2000, "octoprint_data": {"job": {"file": {"name": "b.gcode"}}}})),
        Some(current.clone()),
        at(2001),
    );
    let change = reconciliation.change.unwrap();
    let print = change.current.unwrap();
    assert_ne!(print.id, current.id);
    assert_eq!(print.started_at, at(2000));
    assert_eq!(print.ext_id, Some(2000));
    assert_eq!(print.file_name, "b.gcode");
    let retired = change.retired.unwrap();
    assert_eq!(retired.id, current.id);
    assert_eq!(retired.started_at, at(1000));
}

#[test]
fn superseding_print_with_same_file_name_is_still_new() {
    let current = print_started_at(1000);
    let (print, _) = step(
        json!({"current_print_ts": 3000, "octoprint_event": {"event_type": "PrintStarted", "name": "a.gcode"}}),
        Some(current.clone()),
        3001,
    );
    let print = print.unwrap();
    assert_eq!(print.file_name, current.file_name);
    assert_ne!(print.id, current.id);
}

#[test]
fn cancelled_print_is_terminal() {
    let mut current = print_started_at(1000);
    current.cancel(at(1500));
    for event_type in ["PrintPaused", "PrintResumed", "PrintCancelled", "PrintStarted"] {
        let reconciliation = timestamped::reconcile(
            "p1",
            &timestamped(json!({"current_print_ts": 1000, "octoprint_event": {"event_type": event_type}})),
            Some(current.clone()),
            at(1600),
        );
        assert!(reconciliation.change.is_none(), "{event_type}");
        assert!(reconciliation.events.is_empty(), "{event_type}");
    }
}

#[test]
fn negative_timestamp_closes_print() {
    let current = print_started_at(1000);
    let reconciliation = timestamped::reconcile(
        "p1",
        &timestamped(json!({"current_print_ts": -1, "octoprint_event": {"event_type": "PrintPaused"}})),
        Some(current.clone()),
        at(2000),
    );
    let change = reconciliation.change.unwrap();
    assert!(change.current.is_none());
    assert!(change.retired.unwrap().finished);
    assert!(reconciliation.events.is_empty(), "no current print, no events");
}

#[test]
fn other_events_only_refresh() {
    let current = print_started_at(1000);
    let (print, events) = step(
        json!({"current_print_ts": 1000, "octoprint_event": {"event_type": "PrintDone", "name": "a.gcode"}}),
        Some(current.clone()),
        1300,
    );
    let print = print.unwrap();
    assert_eq!(print.updated_at, at(1300));
    assert_eq!(print.paused_at, current.paused_at);
    assert_eq!(print.cancelled_at, None);
    assert!(events.is_empty());
}
