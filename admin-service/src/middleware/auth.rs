//! Admin authentication middleware.
//!
//! Every `/admin` route requires the service API key plus an `x-admin-id`
//! header naming the acting admin. The resolved `User` is attached as a
//! request extension so handlers and the gateway never re-fetch the actor.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    // Check for X-Admin-Api-Key header
    let api_key = headers
        .get("X-Admin-Api-Key")
        .and_then(|value| value.to_str().ok());

    match api_key {
        Some(key) if key == state.config.security.admin_api_key => {}
        _ => {
            tracing::warn!("Failed admin authentication attempt");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized: Invalid or missing admin API key" })),
            )
                .into_response();
        }
    }

    let admin_id = headers
        .get("x-admin-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok());

    let Some(admin_id) = admin_id else {
        tracing::warn!("Admin request without a valid x-admin-id header");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized: Invalid or missing admin id" })),
        )
            .into_response();
    };

    let admin = match state.store.find_user(admin_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(admin_id = %admin_id, "Admin request from unknown user");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized: Unknown admin" })),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve admin user");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    if !admin.is_admin() {
        tracing::warn!(admin_id = %admin_id, "Non-admin user attempted an admin route");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden: Admin role required" })),
        )
            .into_response();
    }

    request.extensions_mut().insert(admin);
    next.run(request).await
}
