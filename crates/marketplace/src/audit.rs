use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use reservo_core::{AuditLogId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    PasswordChange,
    PasswordReset,
    Confirm,
    Complete,
    Cancel,
}

/// Entity type names recorded on audit entries.
pub mod entity_type {
    pub const USER: &str = "user";
    pub const PROVIDER: &str = "provider";
    pub const SERVICE: &str = "service";
    pub const BOOKING: &str = "booking";
    pub const REVIEW: &str = "review";
}

/// An append-only audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: AuditLogId,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
        user_id: Option<UserId>,
        metadata: JsonValue,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            user_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            metadata,
            created_at: now,
        }
    }
}
