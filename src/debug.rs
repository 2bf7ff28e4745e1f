//! Step logger gated by the per-installation debug flag.
//!
//! Every pipeline component receives a `DebugLog` instead of reading a global,
//! so tests can run components with logging on or off without shared state.
//! Payloads are rendered as pretty JSON; anything that fails to serialize is
//! replaced by a placeholder so a bad payload never takes the handler down.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Long strings inside payloads are cut to this many chars.
const MAX_STRING_CHARS: usize = 2500;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebugLog {
    enabled: bool,
}

impl DebugLog {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Log a bare message.
    pub fn step(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        info!(target: "strike", "{msg}");
    }

    /// Log a message followed by a JSON rendering of `data`.
    pub fn step_with<T: Serialize + ?Sized>(&self, msg: &str, data: &T) {
        if !self.enabled {
            return;
        }
        let payload = safe_stringify(data);
        info!(target: "strike", "{msg}\n{payload}");
    }
}

/// Pretty JSON with long strings truncated; never fails.
pub fn safe_stringify<T: Serialize + ?Sized>(data: &T) -> String {
    match serde_json::to_value(data) {
        Ok(mut v) => {
            truncate_strings(&mut v);
            serde_json::to_string_pretty(&v)
                .unwrap_or_else(|e| format!("<<unstringifiable: {e}>>"))
        }
        Err(e) => format!("<<unstringifiable: {e}>>"),
    }
}

fn truncate_strings(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.chars().count() > MAX_STRING_CHARS {
                let mut cut: String = s.chars().take(MAX_STRING_CHARS).collect();
                cut.push_str("…(truncated)");
                *s = cut;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(truncate_strings),
        Value::Object(map) => map.values_mut().for_each(truncate_strings),
        _ => {}
    }
}
