//! Execution timing records kept in cell metadata.
//!
//! Timing lives under the cell's `"execution"` metadata key as a flat object
//! mapping message kinds to ISO 8601 timestamps, e.g.
//! `"iopub.status.busy"` or `"shell.execute_reply"`.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::backend::MessageHeader;

pub const TIMING_KEY: &str = "execution";

/// The message's own timestamp, else the local wall clock.
pub fn timestamp(header: &MessageHeader) -> String {
    header.date.clone().unwrap_or_else(now)
}

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Starts an empty record, replacing any previous one.
pub fn start(metadata: &mut Map<String, Value>) {
    metadata.insert(TIMING_KEY.to_string(), Value::Object(Map::new()));
}

pub fn clear(metadata: &mut Map<String, Value>) {
    metadata.remove(TIMING_KEY);
}

/// Stores `key = at` in the record, creating it if needed.
pub fn record(metadata: &mut Map<String, Value>, key: &str, at: String) {
    let entry = metadata
        .entry(TIMING_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(record) = entry {
        record.insert(key.to_string(), Value::String(at));
    }
}
