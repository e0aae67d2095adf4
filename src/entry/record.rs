//! Storage-record form of an audit entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::types::{AuditAction, AuditEntry};

/// The shape handed to a persistence sink.
///
/// Snapshots and context are serialized to JSON text here, once, at the
/// intake boundary. An encoding failure nulls the affected field with a
/// diagnostic and the record is still persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Identity of the acting user, if known.
    pub actor_profile_id: Option<Uuid>,
    /// Identity of the owning aggregate.
    pub subject_id: Option<Uuid>,
    /// Classified operation.
    pub action: AuditAction,
    /// Logical name of the affected resource collection.
    pub target_table: String,
    /// Identifier of the affected record.
    pub record_id: String,
    /// JSON text of the before-state snapshot.
    pub old_data: Option<String>,
    /// JSON text of the after-state snapshot.
    pub new_data: Option<String>,
    /// JSON text of the request context, absent when the context is empty.
    pub context: Option<String>,
    /// Justification for the action.
    pub reason: String,
    /// Carried from the entry's creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<AuditEntry> for AuditRecord {
    fn from(entry: AuditEntry) -> Self {
        let context = if entry.context.is_empty() {
            None
        } else {
            encode_field("context", &Value::Object(entry.context))
        };
        Self {
            actor_profile_id: entry.actor_profile_id,
            subject_id: entry.subject_id,
            action: entry.action,
            target_table: entry.target_table,
            record_id: entry.record_id,
            old_data: entry.old_data.as_ref().and_then(|v| encode_field("old_data", v)),
            new_data: entry.new_data.as_ref().and_then(|v| encode_field("new_data", v)),
            context,
            reason: entry.reason,
            created_at: entry.timestamp,
        }
    }
}

fn encode_field(field: &'static str, value: &Value) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(text) => Some(text),
        Err(error) => {
            tracing::warn!(field, error = %error, "Record field encoding failed, field nulled");
            None
        }
    }
}
