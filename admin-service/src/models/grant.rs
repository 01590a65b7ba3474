//! Permission grant model - per-admin overrides of the default-allow baseline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Permission grant entity.
///
/// Admins start with every catalog permission; a grant row with
/// `allowed_flag = false` is an explicit deny that subtracts one.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PermissionGrant {
    pub grant_id: Uuid,
    pub admin_user_id: Uuid,
    pub permission_key: String,
    pub allowed_flag: bool,
    pub granted_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl PermissionGrant {
    /// Create a new grant record.
    pub fn new(
        admin_user_id: Uuid,
        permission_key: String,
        allowed_flag: bool,
        granted_by_user_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            grant_id: Uuid::new_v4(),
            admin_user_id,
            permission_key,
            allowed_flag,
            granted_by_user_id,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Check if this grant subtracts its permission.
    pub fn is_denial(&self) -> bool {
        !self.allowed_flag
    }
}
