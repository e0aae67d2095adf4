//! Audit entry types describing one recorded business action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Classified operation recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A record was created.
    Create,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
    /// A collection was listed. Never persisted.
    List,
    /// A single record was viewed. Never persisted.
    View,
    /// An invite was sent.
    InviteSent,
    /// An invite was cancelled.
    InviteCancelled,
    /// A user was removed from an aggregate.
    UserRemoved,
    /// An account was suspended.
    Suspended,
    /// A subscription was cancelled.
    SubscriptionCancelled,
}

impl AuditAction {
    /// Returns the string representation for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::View => "view",
            Self::InviteSent => "invite_sent",
            Self::InviteCancelled => "invite_cancelled",
            Self::UserRemoved => "user_removed",
            Self::Suspended => "suspended",
            Self::SubscriptionCancelled => "subscription_cancelled",
        }
    }

    /// Whether entries with this action are ever written to a sink.
    ///
    /// Read-only classifications (`List`, `View`) are valid on an entry
    /// but never persisted.
    #[must_use]
    pub fn is_persistable(self) -> bool {
        !matches!(self, Self::List | Self::View)
    }

    /// Whether this action takes the synchronous fast path.
    ///
    /// High-impact operations trade added caller latency for a stronger
    /// durability guarantee and bypass the intake queue entirely.
    #[must_use]
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            Self::Delete
                | Self::Suspended
                | Self::UserRemoved
                | Self::SubscriptionCancelled
                | Self::InviteCancelled
        )
    }

    /// Default justification used when an entry carries a blank reason.
    #[must_use]
    pub fn default_reason(self) -> &'static str {
        match self {
            Self::Create => "record created",
            Self::Update => "record updated",
            Self::Delete => "record deleted",
            Self::List => "records listed",
            Self::View => "record viewed",
            Self::InviteSent => "invite sent",
            Self::InviteCancelled => "invite cancelled",
            Self::UserRemoved => "user removed",
            Self::Suspended => "account suspended",
            Self::SubscriptionCancelled => "subscription cancelled",
        }
    }
}

/// A single recorded occurrence of a mutating action.
///
/// Entries are immutable by contract once built. The asynchronous intake
/// path clones the entry before it crosses onto the worker task, so a
/// caller may reuse or drop its own copy freely after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Identity of the acting user, if known.
    pub actor_profile_id: Option<Uuid>,
    /// Identity of the owning aggregate (business or catalog scope).
    pub subject_id: Option<Uuid>,
    /// Classified operation.
    pub action: AuditAction,
    /// Logical name of the affected resource collection.
    pub target_table: String,
    /// Identifier of the affected record; empty if unknown at capture time.
    pub record_id: String,
    /// JSON snapshot of the record before the action.
    pub old_data: Option<Value>,
    /// JSON snapshot of the record after the action.
    pub new_data: Option<Value>,
    /// Request metadata: method, path, status, duration, client identity.
    pub context: Map<String, Value>,
    /// Free-text justification.
    pub reason: String,
    /// Assigned once, at entry-creation time.
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a new builder for an audit entry.
    #[must_use]
    pub fn builder(action: AuditAction, target_table: impl Into<String>) -> AuditEntryBuilder {
        AuditEntryBuilder::new(action, target_table)
    }

    /// Whether this entry is eligible for persistence.
    ///
    /// Requires a persistable action and at least one data snapshot; a
    /// `Create` carrying only `new_data` satisfies the snapshot rule.
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        self.action.is_persistable() && (self.old_data.is_some() || self.new_data.is_some())
    }
}

/// Builder for creating audit entries.
#[derive(Debug, Clone)]
pub struct AuditEntryBuilder {
    actor_profile_id: Option<Uuid>,
    subject_id: Option<Uuid>,
    action: AuditAction,
    target_table: String,
    record_id: String,
    old_data: Option<Value>,
    new_data: Option<Value>,
    context: Map<String, Value>,
    reason: String,
    timestamp: DateTime<Utc>,
}

impl AuditEntryBuilder {
    /// Create a new builder with required fields.
    ///
    /// The timestamp is assigned here, at entry-creation time.
    pub fn new(action: AuditAction, target_table: impl Into<String>) -> Self {
        Self {
            actor_profile_id: None,
            subject_id: None,
            action,
            target_table: target_table.into(),
            record_id: String::new(),
            old_data: None,
            new_data: None,
            context: Map::new(),
            reason: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the acting user.
    #[must_use]
    pub fn actor_profile_id(mut self, id: Uuid) -> Self {
        self.actor_profile_id = Some(id);
        self
    }

    /// Set the owning aggregate.
    #[must_use]
    pub fn subject_id(mut self, id: Uuid) -> Self {
        self.subject_id = Some(id);
        self
    }

    /// Set the affected record identifier.
    #[must_use]
    pub fn record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = id.into();
        self
    }

    /// Snapshot the record state before the action.
    ///
    /// An encoding failure nulls the field and emits a diagnostic; it is
    /// never surfaced to the caller.
    #[must_use]
    pub fn old_data<T: Serialize>(mut self, snapshot: &T) -> Self {
        self.old_data = encode_snapshot("old_data", snapshot);
        self
    }

    /// Snapshot the record state after the action.
    ///
    /// An encoding failure nulls the field and emits a diagnostic; it is
    /// never surfaced to the caller.
    #[must_use]
    pub fn new_data<T: Serialize>(mut self, snapshot: &T) -> Self {
        self.new_data = encode_snapshot("new_data", snapshot);
        self
    }

    /// Add a string value to the request context.
    #[must_use]
    pub fn context_str(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), Value::String(value.into()));
        self
    }

    /// Add a numeric value to the request context.
    #[must_use]
    pub fn context_num(mut self, key: impl Into<String>, value: impl Into<serde_json::Number>) -> Self {
        self.context.insert(key.into(), Value::Number(value.into()));
        self
    }

    /// Add a boolean value to the request context.
    #[must_use]
    pub fn context_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.context.insert(key.into(), Value::Bool(value));
        self
    }

    /// Add an arbitrary value to the request context.
    ///
    /// Nested maps and lists survive serialization without losing type
    /// information.
    #[must_use]
    pub fn context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Set the justification.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Override the creation timestamp.
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the audit entry, defaulting a blank reason from the action.
    #[must_use]
    pub fn build(self) -> AuditEntry {
        let reason = if self.reason.trim().is_empty() {
            self.action.default_reason().to_string()
        } else {
            self.reason
        };
        AuditEntry {
            actor_profile_id: self.actor_profile_id,
            subject_id: self.subject_id,
            action: self.action,
            target_table: self.target_table,
            record_id: self.record_id,
            old_data: self.old_data,
            new_data: self.new_data,
            context: self.context,
            reason,
            timestamp: self.timestamp,
        }
    }
}

fn encode_snapshot<T: Serialize>(field: &'static str, snapshot: &T) -> Option<Value> {
    match serde_json::to_value(snapshot) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(field, error = %error, "Snapshot encoding failed, field nulled");
            None
        }
    }
}
