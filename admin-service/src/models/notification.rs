//! Notification model - in-app messages, the fallback delivery channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Notification entity.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub title_text: String,
    pub body_text: String,
    pub read_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl Notification {
    /// Create a new unread notification.
    pub fn new(user_id: Uuid, title_text: String, body_text: String) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            user_id,
            title_text,
            body_text,
            read_flag: false,
            created_utc: Utc::now(),
        }
    }
}
