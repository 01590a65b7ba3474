use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Missing permission: {permission}")]
    Forbidden { permission: String },

    #[error("Confirmation required for action: {action}")]
    ChallengeRequired { action: String },

    #[error("Challenge is not valid for this request")]
    ChallengeInvalid,

    #[error("Confirmation code is incorrect")]
    ChallengeCodeInvalid,

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let (status, code, error_message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                err.to_string(),
                None,
            ),
            AppError::NotFound(err) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), None)
            }
            AppError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                err.to_string(),
                None,
            ),
            AppError::Forbidden { permission } => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                format!("Missing permission: {}", permission),
                None,
            ),
            AppError::ChallengeRequired { action } => (
                StatusCode::FORBIDDEN,
                "CHALLENGE_REQUIRED",
                "This action requires confirmation".to_string(),
                Some(action),
            ),
            // Expired, consumed, mismatched, and unknown challenges share one
            // message so callers cannot probe challenge state.
            AppError::ChallengeInvalid => (
                StatusCode::FORBIDDEN,
                "CHALLENGE_INVALID",
                "Challenge is not valid for this request".to_string(),
                None,
            ),
            AppError::ChallengeCodeInvalid => (
                StatusCode::FORBIDDEN,
                "CHALLENGE_CODE_INVALID",
                "Confirmation code is incorrect".to_string(),
                None,
            ),
            AppError::Conflict(err) => {
                (StatusCode::CONFLICT, "CONFLICT", err.to_string(), None)
            }
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
                Some(format!("{:#?}", err)),
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service unavailable".to_string(),
                None,
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error".to_string(),
                Some(err.to_string()),
            ),
            AppError::EmailError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "EMAIL_ERROR",
                "Email error".to_string(),
                Some(msg),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                code,
                details,
            }),
        )
            .into_response()
    }
}
