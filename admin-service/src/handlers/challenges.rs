//! Challenge issuance handler.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::User;
use crate::services::IssueChallenge;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct IssueChallengeRequest {
    /// Wire key of the governed action, e.g. `USER_BAN`.
    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,
    pub entity_id: Option<Uuid>,
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// The code itself is delivered out of band, never in this response.
#[derive(Debug, Serialize)]
pub struct IssueChallengeResponse {
    pub challenge_id: Uuid,
    pub action_key: String,
    pub expiry_utc: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a one-time confirmation challenge for a governed action.
///
/// POST /admin/challenges
#[tracing::instrument(skip(state, admin, req), fields(actor_id = %admin.user_id, action_key = %req.action))]
pub async fn issue_challenge(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Json(req): Json<IssueChallengeRequest>,
) -> Result<(StatusCode, Json<IssueChallengeResponse>), AppError> {
    req.validate()?;

    let action = state.registry.resolve(&req.action)?;

    let issued = state
        .challenges
        .issue(
            &admin,
            IssueChallenge {
                action,
                entity_id: req.entity_id,
                reason: req.reason,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueChallengeResponse {
            challenge_id: issued.challenge_id,
            action_key: issued.action_key,
            expiry_utc: issued.expiry_utc,
        }),
    ))
}
