//! Waitlist handlers: contact (invite) and promote (enroll).
//!
//! Both mutations guard on the target still being on the waitlist. Outbound
//! email is best-effort; a bounce never rolls back the state change.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::users::ConfirmedActionRequest;
use crate::models::{Notification, User, UserResponse};
use crate::services::{ActionRequest, AdminAction, Mutation, ServiceError};
use crate::AppState;
use service_core::error::AppError;
use validator::Validate;

// ============================================================================
// Handlers
// ============================================================================

/// Contact a waitlisted user: mark them invited and send the invite.
///
/// POST /admin/waitlist/:user_id/contact
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id))]
pub async fn contact_waitlisted_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ConfirmedActionRequest>,
) -> Result<Json<UserResponse>, AppError> {
    req.validate()?;

    let answer = super::challenge_answer(req.challenge_id, req.code);
    let store = state.store.clone();
    let email = state.email.clone();

    let user = state
        .gateway
        .execute(
            ActionRequest {
                actor: admin,
                action: AdminAction::WaitlistContact,
                answer,
                reason: req.reason,
                entity_id: Some(user_id),
                target_user_id: Some(user_id),
            },
            move || async move {
                let user = store
                    .find_user(user_id)
                    .await?
                    .ok_or(ServiceError::UserNotFound)?;
                if !user.is_on_waitlist() {
                    return Err(ServiceError::NotOnWaitlist(user_id));
                }

                let updated = store
                    .mark_waitlist_contacted(user_id)
                    .await?
                    .ok_or(ServiceError::NotOnWaitlist(user_id))?;

                if let Err(e) = email
                    .send_waitlist_invite(&updated.email, updated.display_name.as_deref())
                    .await
                {
                    tracing::warn!(error = %e, user_id = %user_id, "Waitlist invite email failed");
                }

                let notification = Notification::new(
                    user_id,
                    "You're off the waitlist".to_string(),
                    "An admin has opened your spot. Check your email for the invite."
                        .to_string(),
                );
                if let Err(e) = store.insert_notification(&notification).await {
                    tracing::warn!(error = %e, user_id = %user_id, "Waitlist invite notification failed");
                }

                Ok(Mutation::new(updated.sanitized())
                    .entity(user_id)
                    .target(user_id)
                    .note("enrollment_state", json!(updated.enrollment_state_code)))
            },
        )
        .await?;

    Ok(Json(user))
}

/// Promote a waitlisted user to a full member.
///
/// POST /admin/waitlist/:user_id/promote
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id))]
pub async fn promote_waitlisted_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ConfirmedActionRequest>,
) -> Result<Json<UserResponse>, AppError> {
    req.validate()?;

    let answer = super::challenge_answer(req.challenge_id, req.code);
    let store = state.store.clone();
    let email = state.email.clone();

    let user = state
        .gateway
        .execute(
            ActionRequest {
                actor: admin,
                action: AdminAction::WaitlistPromote,
                answer,
                reason: req.reason,
                entity_id: Some(user_id),
                target_user_id: Some(user_id),
            },
            move || async move {
                let user = store
                    .find_user(user_id)
                    .await?
                    .ok_or(ServiceError::UserNotFound)?;
                if !user.is_on_waitlist() {
                    return Err(ServiceError::NotOnWaitlist(user_id));
                }

                let updated = store
                    .promote_waitlisted_user(user_id)
                    .await?
                    .ok_or(ServiceError::NotOnWaitlist(user_id))?;

                if let Err(e) = email
                    .send_welcome(&updated.email, updated.display_name.as_deref())
                    .await
                {
                    tracing::warn!(error = %e, user_id = %user_id, "Welcome email failed");
                }

                Ok(Mutation::new(updated.sanitized())
                    .entity(user_id)
                    .target(user_id)
                    .note("old_enrollment_state", json!(user.enrollment_state_code))
                    .note("enrollment_state", json!(updated.enrollment_state_code)))
            },
        )
        .await?;

    Ok(Json(user))
}
