//! Audit sinks. Recording is fire-and-forget: a sink never fails the caller.

use std::sync::Mutex;

use crate::models::audit::AuditEntry;

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &str, entry: AuditEntry);
}

/// Emits audit events on the `audit` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &str, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            event,
            actor_id = entry.actor_id,
            tags = ?entry.tags,
            metadata = %entry.metadata,
            "audit event"
        );
    }
}

/// Keeps every event in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<(String, AuditEntry)>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, AuditEntry)> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Names of recorded events, oldest first
    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|(name, _)| name).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &str, entry: AuditEntry) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event.to_string(), entry));
        }
    }
}
