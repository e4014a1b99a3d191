//! Typed view of an agent status report.
//!
//! Agents post loosely shaped JSON. [`StatusReport::from_value`] checks the
//! documented shapes once and splits the report by protocol generation, so
//! nothing downstream touches raw maps except the status normalizer.
//!
//! Every field is optional. Absent keys and JSON `null` mean "no
//! information"; a value of the wrong shape rejects the whole report.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("report is not a JSON object")]
    NotAnObject,
    #[error("malformed field `{field}`: expected {expected}")]
    Malformed {
        field: &'static str,
        expected: &'static str,
    },
}

/// Lifecycle notification kinds sent by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PrintStarted,
    PrintDone,
    PrintCancelled,
    PrintPaused,
    PrintResumed,
    Other(String),
}

impl From<&str> for EventType {
    fn from(raw: &str) -> Self {
        match raw {
            "PrintStarted" => EventType::PrintStarted,
            "PrintDone" => EventType::PrintDone,
            "PrintCancelled" => EventType::PrintCancelled,
            "PrintPaused" => EventType::PrintPaused,
            "PrintResumed" => EventType::PrintResumed,
            other => EventType::Other(other.to_string()),
        }
    }
}

/// An explicit lifecycle event embedded in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintEvent {
    pub event_type: Option<EventType>,
    pub file_name: Option<String>,
}

impl PrintEvent {
    /// File name, if the agent sent a non-empty one.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// OctoPrint state flags that matter for print detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFlags {
    pub cancelling: bool,
    pub paused: bool,
    pub pausing: bool,
    pub printing: bool,
    pub resuming: bool,
    pub finishing: bool,
}

impl StateFlags {
    /// True when any flag says a job is loaded and in progress.
    pub fn any_active(&self) -> bool {
        self.cancelling || self.paused || self.pausing || self.printing || self.resuming || self.finishing
    }
}

/// Point-in-time state summary without an explicit lifecycle event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolledSnapshot {
    pub job_file_name: Option<String>,
    pub flags: StateFlags,
}

/// A report from an agent that does not send `current_print_ts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyReport {
    pub event: Option<PrintEvent>,
    pub snapshot: Option<PolledSnapshot>,
}

/// What `current_print_ts` says about the agent's print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMarker {
    /// A print is active; `ext_id` is the raw agent timestamp.
    Active { ext_id: i64, started_at: DateTime<Utc> },
    /// The agent sent a negative timestamp: nothing is printing.
    NotPrinting,
}

/// A report from an agent that identifies prints by start timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedReport {
    pub marker: PrintMarker,
    pub event: Option<PrintEvent>,
    pub snapshot: Option<PolledSnapshot>,
}

/// Protocol generation, selected by the presence of `current_print_ts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Legacy(LegacyReport),
    Timestamped(TimestampedReport),
}

/// A validated inbound report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// `octoprint_settings.webcam`, when the agent sent settings.
    pub webcam_settings: Option<Map<String, Value>>,
    pub report: Report,
    /// The raw document, kept for the status snapshot.
    pub raw: Map<String, Value>,
}

impl StatusReport {
    pub fn from_value(value: Value) -> Result<Self, ReportError> {
        let Value::Object(raw) = value else {
            return Err(ReportError::NotAnObject);
        };

        let webcam_settings = match object(raw.get("octoprint_settings"), "octoprint_settings")? {
            Some(settings) if !settings.is_empty() => {
                object(settings.get("webcam"), "octoprint_settings.webcam")?.cloned()
            }
            _ => None,
        };

        let event = object(raw.get("octoprint_event"), "octoprint_event")?
            .map(RawEvent::parse)
            .transpose()?;
        let snapshot = object(raw.get("octoprint_data"), "octoprint_data")?
            .map(parse_snapshot)
            .transpose()?;

        let report = match parse_marker(raw.get("current_print_ts"))? {
            Some(marker) => Report::Timestamped(TimestampedReport {
                marker,
                event: event.map(RawEvent::into_timestamped),
                snapshot,
            }),
            None => Report::Legacy(LegacyReport {
                event: event.map(RawEvent::into_legacy),
                snapshot,
            }),
        };

        Ok(Self { webcam_settings, report, raw })
    }
}

// Agents disagree on where the event's file name lives: legacy agents nest it
// under `data`, timestamped agents put it at the top level.
struct RawEvent {
    event_type: Option<EventType>,
    data_name: Option<String>,
    name: Option<String>,
}

impl RawEvent {
    fn parse(map: &Map<String, Value>) -> Result<Self, ReportError> {
        let event_type = string(map.get("event_type"), "octoprint_event.event_type")?
            .map(|raw| EventType::from(raw.as_str()));
        let data_name = match object(map.get("data"), "octoprint_event.data")? {
            Some(data) => string(data.get("name"), "octoprint_event.data.name")?,
            None => None,
        };
        let name = string(map.get("name"), "octoprint_event.name")?;
        Ok(Self { event_type, data_name, name })
    }

    fn into_legacy(self) -> PrintEvent {
        PrintEvent { event_type: self.event_type, file_name: self.data_name }
    }

    fn into_timestamped(self) -> PrintEvent {
        PrintEvent { event_type: self.event_type, file_name: self.name }
    }
}

fn parse_snapshot(data: &Map<String, Value>) -> Result<PolledSnapshot, ReportError> {
    let mut flags = StateFlags::default();
    if let Some(state) = object(data.get("state"), "octoprint_data.state")? {
        if let Some(raw_flags) = object(state.get("flags"), "octoprint_data.state.flags")? {
            flags.cancelling = flag(raw_flags, "cancelling")?;
            flags.paused = flag(raw_flags, "paused")?;
            flags.pausing = flag(raw_flags, "pausing")?;
            flags.printing = flag(raw_flags, "printing")?;
            flags.resuming = flag(raw_flags, "resuming")?;
            flags.finishing = flag(raw_flags, "finishing")?;
        }
    }

    let mut job_file_name = None;
    if let Some(job) = object(data.get("job"), "octoprint_data.job")? {
        if let Some(file) = object(job.get("file"), "octoprint_data.job.file")? {
            job_file_name = string(file.get("name"), "octoprint_data.job.file.name")?;
        }
    }

    Ok(PolledSnapshot { job_file_name, flags })
}

/// `None` selects the legacy protocol: the key is absent, null or zero.
fn parse_marker(value: Option<&Value>) -> Result<Option<PrintMarker>, ReportError> {
    const FIELD: &str = "current_print_ts";
    let ts = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(ts) => ts,
            None => match n.as_f64() {
                Some(ts) if ts.is_finite() && ts.abs() < i64::MAX as f64 => ts.trunc() as i64,
                _ => return Err(ReportError::Malformed { field: FIELD, expected: "an epoch timestamp" }),
            },
        },
        Some(_) => return Err(ReportError::Malformed { field: FIELD, expected: "a number" }),
    };

    if ts == 0 {
        return Ok(None);
    }
    if ts < 0 {
        return Ok(Some(PrintMarker::NotPrinting));
    }
    DateTime::from_timestamp(ts, 0)
        .map(|started_at| Some(PrintMarker::Active { ext_id: ts, started_at }))
        .ok_or(ReportError::Malformed { field: FIELD, expected: "an epoch timestamp" })
}

fn object<'a>(
    value: Option<&'a Value>,
    field: &'static str,
) -> Result<Option<&'a Map<String, Value>>, ReportError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ReportError::Malformed { field, expected: "an object" }),
    }
}

fn string(value: Option<&Value>, field: &'static str) -> Result<Option<String>, ReportError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ReportError::Malformed { field, expected: "a string" }),
    }
}

fn flag(flags: &Map<String, Value>, name: &'static str) -> Result<bool, ReportError> {
    match flags.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(set)) => Ok(*set),
        Some(_) => Err(ReportError::Malformed { field: "octoprint_data.state.flags", expected: "boolean flags" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Report {
        StatusReport::from_value(value).unwrap().report
    }

    #[test]
    fn empty_report_is_legacy_with_nothing_in_it() {
        assert_eq!(parse(json!({})), Report::Legacy(LegacyReport::default()));
    }

    #[test]
    fn legacy_event_reads_name_from_data() {
        let report = parse(json!({
            "octoprint_event": {"event_type": "PrintStarted", "data": {"name": "a.gcode"}, "name": "ignored.gcode"}
        }));
        let Report::Legacy(legacy) = report else { panic!("expected legacy report") };
        let event = legacy.event.unwrap();
        assert_eq!(event.event_type, Some(EventType::PrintStarted));
        assert_eq!(event.file_name(), Some("a.gcode"));
    }

    #[test]
    fn null_event_data_is_tolerated() {
        let report = parse(json!({"octoprint_event": {"event_type": "PrintDone", "data": null}}));
        let Report::Legacy(legacy) = report else { panic!("expected legacy report") };
        assert_eq!(legacy.event.unwrap().file_name(), None);
    }

    #[test]
    fn timestamped_event_reads_top_level_name() {
        let report = parse(json!({
            "current_print_ts": 1000,
            "octoprint_event": {"event_type": "PrintPaused", "name": "b.gcode"}
        }));
        let Report::Timestamped(ts) = report else { panic!("expected timestamped report") };
        assert_eq!(ts.marker, PrintMarker::Active {
            ext_id: 1000,
            started_at: DateTime::from_timestamp(1000, 0).unwrap(),
        });
        assert_eq!(ts.event.unwrap().file_name(), Some("b.gcode"));
    }

    #[test]
    fn zero_or_null_timestamp_selects_legacy() {
        assert!(matches!(parse(json!({"current_print_ts": 0})), Report::Legacy(_)));
        assert!(matches!(parse(json!({"current_print_ts": null})), Report::Legacy(_)));
    }

    #[test]
    fn negative_timestamp_means_not_printing() {
        let Report::Timestamped(ts) = parse(json!({"current_print_ts": -1})) else {
            panic!("expected timestamped report")
        };
        assert_eq!(ts.marker, PrintMarker::NotPrinting);
    }

    #[test]
    fn fractional_timestamp_is_truncated() {
        let Report::Timestamped(ts) = parse(json!({"current_print_ts": 1500.75})) else {
            panic!("expected timestamped report")
        };
        assert!(matches!(ts.marker, PrintMarker::Active { ext_id: 1500, .. }));
    }

    #[test]
    fn snapshot_flags_and_job_name() {
        let Report::Legacy(legacy) = parse(json!({
            "octoprint_data": {
                "state": {"flags": {"printing": true, "operational": true}},
                "job": {"file": {"name": "c.gcode"}}
            }
        })) else {
            panic!("expected legacy report")
        };
        let snapshot = legacy.snapshot.unwrap();
        assert!(snapshot.flags.printing);
        assert!(snapshot.flags.any_active());
        assert_eq!(snapshot.job_file_name.as_deref(), Some("c.gcode"));
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        let cases = [
            (json!([]), ReportError::NotAnObject),
            (
                json!({"octoprint_data": {"state": {"flags": "printing"}}}),
                ReportError::Malformed { field: "octoprint_data.state.flags", expected: "an object" },
            ),
            (
                json!({"octoprint_data": {"state": {"flags": {"printing": "yes"}}}}),
                ReportError::Malformed { field: "octoprint_data.state.flags", expected: "boolean flags" },
            ),
            (
                json!({"current_print_ts": "1000"}),
                ReportError::Malformed { field: "current_print_ts", expected: "a number" },
            ),
            (
                json!({"octoprint_settings": {"webcam": 5}}),
                ReportError::Malformed { field: "octoprint_settings.webcam", expected: "an object" },
            ),
            (
                json!({"octoprint_event": {"event_type": 7}}),
                ReportError::Malformed { field: "octoprint_event.event_type", expected: "a string" },
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(StatusReport::from_value(value).unwrap_err(), expected);
        }
    }

    #[test]
    fn settings_without_webcam_are_ignored() {
        let report = StatusReport::from_value(json!({"octoprint_settings": {"other": 1}})).unwrap();
        assert!(report.webcam_settings.is_none());
        let report = StatusReport::from_value(json!({"octoprint_settings": {"webcam": {"flipH": true}}})).unwrap();
        assert_eq!(report.webcam_settings.unwrap().get("flipH"), Some(&json!(true)));
    }
}
