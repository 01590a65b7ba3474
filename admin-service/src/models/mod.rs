pub mod audit;
pub mod challenge;
pub mod grant;
pub mod notification;
pub mod user;

pub use audit::{AuditEntry, AuditEntryResponse, AuditQuery};
pub use challenge::Challenge;
pub use grant::PermissionGrant;
pub use notification::Notification;
pub use user::{EnrollmentState, User, UserResponse, UserRole};
