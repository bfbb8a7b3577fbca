//! Flattens the section store into plain text for an assistant prompt.
//!
//! Output depends only on store content: sections and object keys are
//! emitted in alphabetical order and timestamps are absolute UTC instants.

use serde_json::{Map, Value};

use super::SectionStore;
use crate::utils::{format_epoch_ms, truncate_string};

/// List items shown per array.
pub const SAMPLE_SIZE: usize = 5;

/// Nested objects are expanded down to this depth.
pub const MAX_DEPTH: usize = 4;

const MAX_STRING_LEN: usize = 200;

pub fn render_summary(store: &SectionStore) -> String {
    let mut out = String::new();
    line(&mut out, 0, "=== MICROSOFT 365 TENANT DATA ===");
    match store.last_updated {
        Some(ms) => line(&mut out, 0, &format!("Last updated: {}", format_epoch_ms(ms))),
        None => line(&mut out, 0, "Last updated: never"),
    }

    if store.sections.is_empty() {
        line(&mut out, 0, "No cached data.");
        return out;
    }

    // BTreeMap iteration is already alphabetical
    let keys: Vec<&str> = store.sections.keys().map(String::as_str).collect();
    line(
        &mut out,
        0,
        &format!("Sections ({}): {}", keys.len(), keys.join(", ")),
    );

    for (key, section) in &store.sections {
        out.push('\n');
        line(&mut out, 0, &format!("## {}", key.to_uppercase()));
        line(&mut out, 0, &format!("Updated: {}", format_epoch_ms(section.timestamp)));

        if let Some(ref metadata) = section.metadata {
            for (name, value) in sorted_entries(metadata) {
                if is_scalar(value) {
                    line(&mut out, 0, &format!("{}: {}", name, scalar_text(value)));
                }
            }
        }

        match &section.data {
            Value::Array(items) => {
                line(&mut out, 0, &format!("Count: {}", items.len()));
                if !items.is_empty() {
                    let shown = items.len().min(SAMPLE_SIZE);
                    line(
                        &mut out,
                        0,
                        &format!("Sample (first {} of {}):", shown, items.len()),
                    );
                    for (i, item) in items.iter().take(SAMPLE_SIZE).enumerate() {
                        match item {
                            Value::Object(map) => {
                                line(&mut out, 0, &format!("- [{}]", i + 1));
                                for (name, value) in sorted_entries(map) {
                                    dump_entry(&mut out, name, value, 2, 1);
                                }
                            }
                            other => dump_entry(&mut out, &format!("- [{}]", i + 1), other, 1, 0),
                        }
                    }
                }
            }
            Value::Object(map) => {
                line(&mut out, 0, &format!("Fields: {}", map.len()));
                for (name, value) in sorted_entries(map) {
                    dump_entry(&mut out, name, value, 1, 1);
                }
            }
            Value::Null => line(&mut out, 0, "No data"),
            scalar => line(&mut out, 0, &format!("Value: {}", scalar_text(scalar))),
        }
    }

    out
}

fn dump_entry(out: &mut String, key: &str, value: &Value, depth: usize, indent: usize) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            if map.is_empty() {
                return;
            }
            if depth >= MAX_DEPTH {
                line(out, indent, &format!("{}: {{{} fields}}", key, map.len()));
                return;
            }
            line(out, indent, &format!("{}:", key));
            for (name, child) in sorted_entries(map) {
                dump_entry(out, name, child, depth + 1, indent + 1);
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                line(out, indent, &format!("{}: []", key));
            } else if items.iter().all(is_scalar) {
                let shown: Vec<String> = items.iter().take(SAMPLE_SIZE).map(scalar_text).collect();
                let more = if items.len() > SAMPLE_SIZE {
                    format!(" (+{} more)", items.len() - SAMPLE_SIZE)
                } else {
                    String::new()
                };
                line(out, indent, &format!("{}: {}{}", key, shown.join(", "), more));
            } else if depth >= MAX_DEPTH {
                line(out, indent, &format!("{}: [{} items]", key, items.len()));
            } else {
                line(out, indent, &format!("{}: ({} items)", key, items.len()));
                for (i, item) in items.iter().take(SAMPLE_SIZE).enumerate() {
                    dump_entry(out, &format!("[{}]", i + 1), item, depth + 1, indent + 1);
                }
            }
        }
        scalar => line(out, indent, &format!("{}: {}", key, scalar_text(scalar))),
    }
}

fn sorted_entries(map: &Map<String, Value>) -> Vec<(&str, &Value)> {
    let mut entries: Vec<(&str, &Value)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => truncate_string(&s.replace(['\r', '\n'], " "), MAX_STRING_LEN),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn line(out: &mut String, indent: usize, text: &str) {
    for _ in 0..indent {
        out.push_str("  ");
    }
    out.push_str(text);
    out.push('\n');
}
