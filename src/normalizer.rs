//! Flattens the parts of a report the UI cares about into string fields.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fields copied from `octoprint_data` into the status snapshot.
pub const DATA_FIELDS: &[(&str, Option<&str>)] = &[("state", None), ("progress", None)];

/// Fields copied from the report root into the status snapshot.
pub const ROOT_FIELDS: &[(&str, Option<&str>)] = &[("octoprint_temperatures", Some("temperatures"))];

/// Render a JSON value the way it is stored: strings verbatim, anything
/// else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copy `source[key]` into `out` under `rename` (or `key`) when present.
/// A JSON `null` counts as absent.
pub fn set_as_str_if_present(
    out: &mut BTreeMap<String, String>,
    source: &Map<String, Value>,
    key: &str,
    rename: Option<&str>,
) {
    match source.get(key) {
        None | Some(Value::Null) => {}
        Some(value) => {
            out.insert(rename.unwrap_or(key).to_string(), stringify(value));
        }
    }
}

pub fn normalize(source: &Map<String, Value>, fields: &[(&str, Option<&str>)]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, rename) in fields {
        set_as_str_if_present(&mut out, source, key, *rename);
    }
    out
}

/// The transient status snapshot: `state`, `progress` and `temperatures`.
pub fn status_snapshot(raw: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut out = match raw.get("octoprint_data") {
        Some(Value::Object(data)) => normalize(data, DATA_FIELDS),
        _ => BTreeMap::new(),
    };
    out.extend(normalize(raw, ROOT_FIELDS));
    out
}

/// Webcam settings keyed `webcam_<name>`.
pub fn settings_dict(webcam: &Map<String, Value>) -> BTreeMap<String, String> {
    webcam
        .iter()
        .map(|(key, value)| (format!("webcam_{key}"), stringify(value)))
        .collect()
}
