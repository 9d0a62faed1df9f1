//! Diagnostics sink and collectors.
//!
//! The core never formats or persists diagnostics itself. Every transition,
//! retry and error is handed to a [`DiagnosticsSink`] as a structured
//! `(component, message, data)` call; the host decides where it goes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

pub mod events;

pub use events::{DiagnosticRecord, Severity};

/// Receiver of structured diagnostics.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, severity: Severity, component: &str, message: &str, data: serde_json::Value);
}

/// Default sink: forwards records to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, severity: Severity, component: &str, message: &str, data: serde_json::Value) {
        match severity {
            Severity::Debug => tracing::debug!(component, %data, "{}", message),
            Severity::Info => tracing::info!(component, %data, "{}", message),
            Severity::Warn => tracing::warn!(component, %data, "{}", message),
            Severity::Error | Severity::Critical => {
                tracing::error!(component, ?severity, %data, "{}", message)
            }
        }
    }
}

/// Snapshot of collector state for CLI reporting and tests.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticsSnapshot {
    pub recent: Vec<DiagnosticRecord>,
    pub total_records: u64,
    pub dropped_records: u64,
}

/// Broadcast-based collector retaining a bounded history of records.
pub struct DiagnosticsCollector {
    tx: broadcast::Sender<DiagnosticRecord>,
    history: Mutex<VecDeque<DiagnosticRecord>>,
    history_capacity: usize,
    total_records: AtomicU64,
    dropped_history: AtomicU64,
}

impl DiagnosticsCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_records: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticRecord> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let recent = match self.history.lock() {
            Ok(history) => history.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        };
        DiagnosticsSnapshot {
            recent,
            total_records: self.total_records.load(Ordering::Relaxed),
            dropped_records: self.dropped_history.load(Ordering::Relaxed),
        }
    }

    /// Records at or above `severity`, oldest first.
    pub fn records_at_least(&self, severity: Severity) -> Vec<DiagnosticRecord> {
        self.snapshot()
            .recent
            .into_iter()
            .filter(|record| record.severity >= severity)
            .collect()
    }

    fn push(&self, record: DiagnosticRecord) {
        self.total_records.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            let mut history = match self.history.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(record.clone());
        }

        let _ = self.tx.send(record);
    }
}

impl Default for DiagnosticsCollector {
    fn default() -> Self {
        Self::new(256, 128)
    }
}

impl DiagnosticsSink for DiagnosticsCollector {
    fn record(&self, severity: Severity, component: &str, message: &str, data: serde_json::Value) {
        self.push(DiagnosticRecord {
            severity,
            component: component.to_string(),
            message: message.to_string(),
            data,
            timestamp_ms: now_timestamp_ms(),
        });
    }
}

/// Fan a record out to several sinks, e.g. tracing plus an in-memory collector.
pub struct FanoutSink {
    sinks: Vec<std::sync::Arc<dyn DiagnosticsSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn DiagnosticsSink>>) -> Self {
        Self { sinks }
    }
}

impl DiagnosticsSink for FanoutSink {
    fn record(&self, severity: Severity, component: &str, message: &str, data: serde_json::Value) {
        for sink in &self.sinks {
            sink.record(severity, component, message, data.clone());
        }
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
