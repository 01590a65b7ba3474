//! Services layer for admin-service.
//!
//! Business logic for permission grants, confirmation challenges, audit
//! recording, and the action gateway that ties them together.

mod actions;
pub mod audit;
mod catalog;
mod challenge;
mod database;
mod email;
pub mod error;
mod gateway;
mod grants;
pub mod metrics;
pub mod store;

pub use actions::{ActionPolicy, ActionRegistry, AdminAction, ConfirmationPolicy};
pub use audit::AuditService;
pub use catalog::PermissionCatalog;
pub use challenge::{ChallengeAnswer, ChallengeService, IssueChallenge, IssuedChallenge};
pub use database::Database;
pub use email::{EmailProvider, MockEmailService, SmtpEmailService};
pub use error::ServiceError;
pub use gateway::{ActionGateway, ActionRequest, Mutation};
pub use grants::GrantService;
pub use store::{ControlPlaneStore, MemoryStore};
