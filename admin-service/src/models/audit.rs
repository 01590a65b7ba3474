//! Audit entry model - append-only trail of governed admin actions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Audit entry entity.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action_key: String,
    pub entity_kind: String,
    pub entity_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub reason_text: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a new audit entry for an admin-initiated action.
    #[allow(clippy::too_many_arguments)]
    pub fn admin_action(
        actor_user_id: Uuid,
        action_key: &str,
        entity_kind: &str,
        entity_id: Option<Uuid>,
        target_user_id: Option<Uuid>,
        reason_text: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            actor_user_id: Some(actor_user_id),
            action_key: action_key.to_string(),
            entity_kind: entity_kind.to_string(),
            entity_id,
            target_user_id,
            reason_text,
            metadata,
            created_utc: Utc::now(),
        }
    }

    /// Create a system-level audit entry (no acting admin).
    pub fn system_action(
        action_key: &str,
        entity_kind: &str,
        entity_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            actor_user_id: None,
            action_key: action_key.to_string(),
            entity_kind: entity_kind.to_string(),
            entity_id,
            target_user_id: None,
            reason_text: None,
            metadata,
            created_utc: Utc::now(),
        }
    }
}

/// Filters for querying the audit trail. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor_user_id: Option<Uuid>,
    pub action_key: Option<String>,
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
}

/// Audit entry response for API.
#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub entry_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action_key: String,
    pub entity_kind: String,
    pub entity_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub reason_text: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(e: AuditEntry) -> Self {
        Self {
            entry_id: e.entry_id,
            actor_user_id: e.actor_user_id,
            action_key: e.action_key,
            entity_kind: e.entity_kind,
            entity_id: e.entity_id,
            target_user_id: e.target_user_id,
            reason_text: e.reason_text,
            metadata: e.metadata,
            created_utc: e.created_utc,
        }
    }
}
