//! Plain-text rendering of server responses.

use std::fmt::Write;

use serde_json::Value;

use crate::types::{ClusterInfo, NodeStatus, ServerInfo};

/// Width of the key column.
const KEY_WIDTH: usize = 16;

/// Pad `text` to `width`, or cut it short with `...` when longer.
pub fn align(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        format!("{text}{}", " ".repeat(width - len))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_row(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "    {} {value}", align(key, KEY_WIDTH));
}

/// One cluster: its name, then every other field indented.
pub fn cluster(info: &ClusterInfo) -> String {
    let mut out = format!("{}\n", info.name);
    for (key, value) in &info.details {
        push_row(&mut out, key, &value_text(value));
    }
    out
}

/// One node: its id, its state, then any status fields.
pub fn node(id: &str, status: &NodeStatus) -> String {
    let mut out = format!("{id}\n");
    push_row(&mut out, "state", &status.state);
    match &status.status {
        Some(Value::Object(fields)) => {
            for (key, value) in fields {
                push_row(&mut out, key, &value_text(value));
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => push_row(&mut out, "status", &value_text(other)),
    }
    out
}

/// Server version record.
pub fn server_info(info: &ServerInfo) -> String {
    let mut out = format!("{}\n", info.service);
    push_row(&mut out, "version", &info.version);
    push_row(&mut out, "api", &info.api);
    out
}
