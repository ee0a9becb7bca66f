//! Diagnostic sink: receives one event per statement dispatched to a target.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEvent {
    pub target: String,
    pub sql: String,
}

pub trait DiagnosticSink: Send + Sync {
    fn on_dispatch(&self, target: &str, sql: &str);
}

/// Emits each dispatch as a structured `tracing` debug event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn on_dispatch(&self, target: &str, sql: &str) {
        tracing::debug!(target_name = target, sql, "dispatching statement to shard");
    }
}

/// Keeps dispatch events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DispatchEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.target.clone()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn on_dispatch(&self, target: &str, sql: &str) {
        self.events.lock().push(DispatchEvent {
            target: target.to_string(),
            sql: sql.to_string(),
        });
    }
}
