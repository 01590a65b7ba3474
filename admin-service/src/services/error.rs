use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalString(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Unknown permission: {0}")]
    InvalidPermission(String),

    #[error("Invalid target user: {0}")]
    InvalidTarget(Uuid),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing permission: {0}")]
    Forbidden(String),

    #[error("Action {0} requires confirmation")]
    ChallengeRequired(String),

    #[error("Challenge is not valid for this request")]
    ChallengeInvalid,

    #[error("Confirmation code is incorrect")]
    ChallengeCodeInvalid,

    #[error("User not found")]
    UserNotFound,

    #[error("Admin not found")]
    AdminNotFound,

    #[error("User {0} is not on the waitlist")]
    NotOnWaitlist(Uuid),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InternalString(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::InvalidPermission(key) => {
                AppError::BadRequest(anyhow::anyhow!("Unknown permission: {}", key))
            }
            ServiceError::InvalidTarget(user_id) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid target user: {}", user_id))
            }
            ServiceError::UnknownAction(key) => {
                AppError::BadRequest(anyhow::anyhow!("Unknown action: {}", key))
            }
            ServiceError::Forbidden(permission) => AppError::Forbidden { permission },
            ServiceError::ChallengeRequired(action) => AppError::ChallengeRequired { action },
            ServiceError::ChallengeInvalid => AppError::ChallengeInvalid,
            ServiceError::ChallengeCodeInvalid => AppError::ChallengeCodeInvalid,
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::AdminNotFound => AppError::NotFound(anyhow::anyhow!("Admin not found")),
            ServiceError::NotOnWaitlist(user_id) => {
                AppError::Conflict(anyhow::anyhow!("User {} is not on the waitlist", user_id))
            }
            ServiceError::EmailError(e) => AppError::EmailError(e),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
