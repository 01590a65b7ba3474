//! Audit query handler.
//!
//! Read access is itself a governed permission (`audit.view`); the log is
//! append-only, so this is the only audit surface.

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AuditEntryResponse, AuditQuery, User};
use crate::services::audit::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Query Parameters
// ============================================================================

/// Query params for listing audit entries.
#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    pub actor_user_id: Option<Uuid>,
    pub action_key: Option<String>,
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

// ============================================================================
// Response Types
// ============================================================================

/// Paginated audit entries response.
#[derive(Debug, Serialize)]
pub struct AuditEntriesResponse {
    pub entries: Vec<AuditEntryResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// List audit entries with filtering and pagination, newest first.
///
/// GET /admin/audit
#[tracing::instrument(
    skip(state, admin),
    fields(
        actor_id = %admin.user_id,
        action_key = ?query.action_key,
        entity_kind = ?query.entity_kind,
        limit = query.limit,
        offset = query.offset
    )
)]
pub async fn query_audit(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<AuditEntriesResponse>, AppError> {
    state
        .grants
        .ensure_permission(admin.user_id, "audit.view")
        .await?;

    // Validate and clamp limits
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.max(0);

    let filter = AuditQuery {
        actor_user_id: query.actor_user_id,
        action_key: query.action_key,
        entity_kind: query.entity_kind,
        entity_id: query.entity_id,
        target_user_id: query.target_user_id,
        from_utc: query.from_utc,
        to_utc: query.to_utc,
    };

    let (entries, total) = state.audit.query(&filter, limit, offset).await?;

    let entries: Vec<AuditEntryResponse> =
        entries.into_iter().map(AuditEntryResponse::from).collect();

    Ok(Json(AuditEntriesResponse {
        entries,
        total,
        limit,
        offset,
    }))
}
