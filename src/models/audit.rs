//! Audit records handed to the external audit sink

use serde::Serialize;
use serde_json::Value;

/// Who did what, with before/after values in `metadata`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor_id: Option<i32>,
    pub metadata: Value,
    pub tags: Vec<String>,
}

impl AuditEntry {
    pub fn new(actor_id: Option<i32>, metadata: Value) -> Self {
        Self {
            actor_id,
            metadata,
            tags: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
