//! Governed user mutation handlers: ban, unban, role changes.
//!
//! Every mutation here goes through the action gateway; the handler's job is
//! DTO validation, assembling the `ActionRequest`, and the store closure.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::models::{User, UserResponse, UserRole};
use crate::services::{ActionRequest, AdminAction, Mutation, ServiceError};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Body shared by ban/unban: confirmation answer plus an optional reason.
#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmedActionRequest {
    pub challenge_id: Option<Uuid>,
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
    pub challenge_id: Option<Uuid>,
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkChangeRoleRequest {
    #[validate(length(min = 1, message = "user_ids must not be empty"))]
    pub user_ids: Vec<Uuid>,
    pub role: UserRole,
    pub challenge_id: Option<Uuid>,
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Unknown ids are skipped, not errors; the counts expose the gap.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkChangeRoleResponse {
    pub requested: usize,
    pub updated: u64,
    pub role: UserRole,
}

// ============================================================================
// Handlers
// ============================================================================

/// Ban a user.
///
/// POST /admin/users/:user_id/ban
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id))]
pub async fn ban_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ConfirmedActionRequest>,
) -> Result<Json<UserResponse>, AppError> {
    set_banned(state, admin, user_id, req, AdminAction::UserBan, true).await
}

/// Lift a ban.
///
/// POST /admin/users/:user_id/unban
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id))]
pub async fn unban_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ConfirmedActionRequest>,
) -> Result<Json<UserResponse>, AppError> {
    set_banned(state, admin, user_id, req, AdminAction::UserUnban, false).await
}

async fn set_banned(
    state: AppState,
    admin: User,
    user_id: Uuid,
    req: ConfirmedActionRequest,
    action: AdminAction,
    banned: bool,
) -> Result<Json<UserResponse>, AppError> {
    req.validate()?;

    let answer = super::challenge_answer(req.challenge_id, req.code);
    let store = state.store.clone();

    let user = state
        .gateway
        .execute(
            ActionRequest {
                actor: admin,
                action,
                answer,
                reason: req.reason,
                entity_id: Some(user_id),
                target_user_id: Some(user_id),
            },
            move || async move {
                let user = store
                    .set_user_banned(user_id, banned)
                    .await?
                    .ok_or(ServiceError::UserNotFound)?;
                Ok(Mutation::new(user.sanitized())
                    .entity(user_id)
                    .target(user_id)
                    .note("banned_flag", json!(banned)))
            },
        )
        .await?;

    Ok(Json(user))
}

/// Change one user's role.
///
/// PATCH /admin/users/:user_id/role
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id))]
pub async fn change_user_role(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    req.validate()?;

    let answer = super::challenge_answer(req.challenge_id, req.code);
    let store = state.store.clone();
    let role = req.role;

    let user = state
        .gateway
        .execute(
            ActionRequest {
                actor: admin,
                action: AdminAction::UserRoleChange,
                answer,
                reason: req.reason,
                entity_id: Some(user_id),
                target_user_id: Some(user_id),
            },
            move || async move {
                let before = store
                    .find_user(user_id)
                    .await?
                    .ok_or(ServiceError::UserNotFound)?;
                let updated = store
                    .set_user_role(user_id, role.as_str())
                    .await?
                    .ok_or(ServiceError::UserNotFound)?;
                Ok(Mutation::new(updated.sanitized())
                    .entity(user_id)
                    .target(user_id)
                    .note("old_role", json!(before.role_code))
                    .note("new_role", json!(updated.role_code)))
            },
        )
        .await?;

    Ok(Json(user))
}

/// Change roles for a batch of users in one statement.
///
/// POST /admin/users/role
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id, count = req.user_ids.len()))]
pub async fn bulk_change_role(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Json(req): Json<BulkChangeRoleRequest>,
) -> Result<Json<BulkChangeRoleResponse>, AppError> {
    req.validate()?;

    let answer = super::challenge_answer(req.challenge_id, req.code);
    let store = state.store.clone();
    let user_ids = req.user_ids;
    let role = req.role;

    let result = state
        .gateway
        .execute(
            ActionRequest {
                actor: admin,
                action: AdminAction::UserBulkRoleChange,
                answer,
                reason: req.reason,
                entity_id: None,
                target_user_id: None,
            },
            move || async move {
                let requested = user_ids.len();
                let updated = store.set_role_bulk(&user_ids, role.as_str()).await?;
                Ok(Mutation::new(BulkChangeRoleResponse {
                    requested,
                    updated,
                    role,
                })
                .note("requested", json!(requested))
                .note("updated", json!(updated))
                .note("new_role", json!(role.as_str())))
            },
        )
        .await?;

    Ok(Json(result))
}
