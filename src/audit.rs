//! Audit trail for data access.
//!
//! Audit records are emitted as structured `tracing` events on the `audit`
//! target so they can be routed separately from application logs. Storage
//! backends call [`log_data_access`] inside their ingest transaction, and the
//! Postgres backend also persists the record to `audit_log`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ---

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
    pub origin: String,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn data_access(
        actor: &str,
        resource_type: &str,
        resource_id: &str,
        action: &str,
        origin: &str,
        details: serde_json::Value,
    ) -> Self {
        AuditEvent {
            id: Uuid::new_v4(),
            at: Utc::now(),
            actor: actor.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            action: action.to_string(),
            origin: origin.to_string(),
            details,
        }
    }
}

/// Emit a data-access audit record.
pub fn log_data_access(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        event_type = "data_access",
        audit_id = %event.id,
        actor = %event.actor,
        resource_type = %event.resource_type,
        resource_id = %event.resource_id,
        action = %event.action,
        origin = %event.origin,
        details = %event.details,
        "data access"
    );
}

/// Emit a system lifecycle record (startup, shutdown).
pub fn log_system_event(event_type: &str, component: &str, details: serde_json::Value) {
    tracing::info!(
        target: "audit",
        event_type = %event_type,
        component = %component,
        details = %details,
        "system event"
    );
}
