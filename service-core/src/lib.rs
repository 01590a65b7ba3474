//! service-core: Shared infrastructure for admin-platform services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
