//! Permission catalog and grant handlers.
//!
//! The catalog read is open to any authenticated admin; effective-set and
//! grant reads require `permissions.view`, and grant writes go through the
//! gateway as `PERMISSION_GRANT_SET`.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::models::{PermissionGrant, User};
use crate::services::{ActionRequest, AdminAction, Mutation};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Catalog response: version plus keys in catalog order.
#[derive(Debug, Serialize)]
pub struct PermissionCatalogResponse {
    pub version: u32,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EffectivePermissionsResponse {
    pub admin_user_id: Uuid,
    pub catalog_version: u32,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GrantListResponse {
    pub admin_user_id: Uuid,
    pub grants: Vec<PermissionGrant>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetGrantRequest {
    #[validate(length(min = 1, message = "Permission key is required"))]
    pub permission_key: String,
    pub allowed: bool,
    pub challenge_id: Option<Uuid>,
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Permission catalog: version + ordered keys.
///
/// GET /admin/permissions
pub async fn get_permission_catalog(State(state): State<AppState>) -> Json<PermissionCatalogResponse> {
    let catalog = state.grants.catalog();
    Json(PermissionCatalogResponse {
        version: catalog.version(),
        keys: catalog.keys().to_vec(),
    })
}

/// Effective permission set for one admin.
///
/// GET /admin/admins/:admin_id/permissions
#[tracing::instrument(skip(state, admin), fields(actor_id = %admin.user_id))]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(admin_id): Path<Uuid>,
) -> Result<Json<EffectivePermissionsResponse>, AppError> {
    state
        .grants
        .ensure_permission(admin.user_id, "permissions.view")
        .await?;

    let permissions = state.grants.effective_permissions(admin_id).await?;

    Ok(Json(EffectivePermissionsResponse {
        admin_user_id: admin_id,
        catalog_version: state.grants.catalog().version(),
        permissions,
    }))
}

/// Grant rows for one admin, in permission-key order.
///
/// GET /admin/admins/:admin_id/grants
#[tracing::instrument(skip(state, admin), fields(actor_id = %admin.user_id))]
pub async fn list_grants(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(admin_id): Path<Uuid>,
) -> Result<Json<GrantListResponse>, AppError> {
    state
        .grants
        .ensure_permission(admin.user_id, "permissions.view")
        .await?;

    let grants = state.grants.list_grants(admin_id).await?;

    Ok(Json(GrantListResponse {
        admin_user_id: admin_id,
        grants,
    }))
}

/// Set (or flip) one permission grant for an admin.
///
/// PUT /admin/admins/:admin_id/grants
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id))]
pub async fn set_grant(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(admin_id): Path<Uuid>,
    Json(req): Json<SetGrantRequest>,
) -> Result<Json<PermissionGrant>, AppError> {
    req.validate()?;

    let answer = super::challenge_answer(req.challenge_id, req.code);
    let actor_id = admin.user_id;
    let grants = state.grants.clone();
    let permission_key = req.permission_key;
    let allowed = req.allowed;

    let grant = state
        .gateway
        .execute(
            ActionRequest {
                actor: admin,
                action: AdminAction::PermissionGrantSet,
                answer,
                reason: req.reason,
                entity_id: None,
                target_user_id: Some(admin_id),
            },
            move || async move {
                let stored = grants
                    .set_grant(admin_id, &permission_key, allowed, actor_id)
                    .await?;
                Ok(Mutation::new(stored.clone())
                    .entity(stored.grant_id)
                    .target(admin_id)
                    .note("permission_key", json!(stored.permission_key))
                    .note("allowed", json!(stored.allowed_flag)))
            },
        )
        .await?;

    Ok(Json(grant))
}
