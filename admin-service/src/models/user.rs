//! User model - principals administered by the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User role codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::Member => "member",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "staff" => Ok(UserRole::Staff),
            "member" => Ok(UserRole::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Enrollment state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentState {
    Enrolled,
    Waitlisted,
    Invited,
}

impl EnrollmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Enrolled => "enrolled",
            EnrollmentState::Waitlisted => "waitlisted",
            EnrollmentState::Invited => "invited",
        }
    }
}

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role_code: String,
    pub banned_flag: bool,
    pub enrollment_state_code: String,
    pub contacted_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new enrolled user.
    pub fn new(email: String, display_name: Option<String>, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email,
            display_name,
            role_code: role.as_str().to_string(),
            banned_flag: false,
            enrollment_state_code: EnrollmentState::Enrolled.as_str().to_string(),
            contacted_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Create a user sitting on the waitlist.
    pub fn waitlisted(email: String, display_name: Option<String>) -> Self {
        let mut user = Self::new(email, display_name, UserRole::Member);
        user.enrollment_state_code = EnrollmentState::Waitlisted.as_str().to_string();
        user
    }

    /// Check if user holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role_code == UserRole::Admin.as_str()
    }

    /// Check if user is still waiting for access (waitlisted or invited).
    pub fn is_on_waitlist(&self) -> bool {
        self.enrollment_state_code == EnrollmentState::Waitlisted.as_str()
            || self.enrollment_state_code == EnrollmentState::Invited.as_str()
    }

    /// Convert to API response shape.
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role_code: String,
    pub banned_flag: bool,
    pub enrollment_state_code: String,
    pub contacted_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            display_name: u.display_name,
            role_code: u.role_code,
            banned_flag: u.banned_flag,
            enrollment_state_code: u.enrollment_state_code,
            contacted_utc: u.contacted_utc,
            created_utc: u.created_utc,
            updated_utc: u.updated_utc,
        }
    }
}
