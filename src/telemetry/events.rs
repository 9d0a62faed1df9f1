//! Diagnostic record types handed to the diagnostics sink.

use serde::{Deserialize, Serialize};

/// Severity attached to each diagnostic record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    /// Escalated condition that needs user action (e.g. resume retry cap reached)
    Critical,
}

/// One structured `(component, message, data)` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticRecord {
    pub severity: Severity,
    pub component: String,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp_ms: u64,
}
