//! Notification fan-out contract.
//!
//! Registry and ledger operations hand finished notifications to a fan-out
//! implementation; delivery is best effort and a transport failure never
//! rolls back the operation that produced the notification.

use serde::Serialize;

use crate::registry::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Registration,
    Distribution,
    EventLifecycle,
    HouseholdLifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

/// A notification addressed to zero or more login accounts. Citizens
/// without a linked account are simply not addressable.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipients: Vec<UserId>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub priority: NotificationPriority,
}

pub trait NotificationFanout: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Default fan-out: logs the notification instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct TracingFanout;

impl NotificationFanout for TracingFanout {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = ?notification.kind,
            entity = notification.entity_kind,
            id = %notification.entity_id,
            recipients = notification.recipients.len(),
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}
