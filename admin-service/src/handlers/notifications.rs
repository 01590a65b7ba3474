//! In-app notification handler (the challenge-code fallback channel).

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{Notification, User};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the acting admin's notifications, newest first.
///
/// GET /admin/notifications
#[tracing::instrument(skip(state, admin), fields(actor_id = %admin.user_id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationsResponse>, AppError> {
    let limit = query.limit.clamp(1, 200);
    let notifications = state.store.list_notifications(admin.user_id, limit).await?;

    Ok(Json(NotificationsResponse { notifications }))
}
