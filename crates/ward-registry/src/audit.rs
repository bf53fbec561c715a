//! Audit-log collaborator contract.
//!
//! Every mutating registry and ledger operation emits one entry after its
//! writes succeed. A failed audit write is logged and swallowed; it never
//! fails the operation that triggered it.

use serde::Serialize;

use crate::registry::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Split,
    Register,
    Distribute,
    Cancel,
    Generate,
}

/// One audit record. `detail` carries a short human-readable delta summary,
/// not a machine format.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub performed_by: Option<UserId>,
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity_kind: &'static str, entity_id: impl Into<String>) -> Self {
        Self {
            action,
            entity_kind,
            entity_id: entity_id.into(),
            performed_by: None,
            detail: None,
        }
    }

    pub fn by(mut self, actor: &UserId) -> Self {
        self.performed_by = Some(actor.clone());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait AuditWriter: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Sink(String),
}

/// Default writer: forwards entries to the tracing pipeline.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditWriter;

impl AuditWriter for TracingAuditWriter {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            action = ?entry.action,
            entity = entry.entity_kind,
            id = %entry.entity_id,
            detail = entry.detail.as_deref().unwrap_or(""),
            "audit"
        );
        Ok(())
    }
}
