//! Grant service - effective permissions and per-admin grant management.
//!
//! Admins hold every catalog permission by default; an `allowed_flag = false`
//! grant subtracts one. Allow rows are kept for auditability but add nothing
//! beyond the baseline.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{PermissionGrant, User};
use crate::services::catalog::PermissionCatalog;
use crate::services::error::ServiceError;
use crate::services::store::ControlPlaneStore;

#[derive(Clone)]
pub struct GrantService {
    store: Arc<dyn ControlPlaneStore>,
    catalog: PermissionCatalog,
}

impl GrantService {
    pub fn new(store: Arc<dyn ControlPlaneStore>, catalog: PermissionCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// Compute the effective permission set: catalog keys minus explicit denies.
    ///
    /// Fails with `AdminNotFound` when `admin_id` does not resolve to an
    /// admin-role user.
    pub async fn effective_permissions(&self, admin_id: Uuid) -> Result<Vec<String>, ServiceError> {
        self.require_admin(admin_id).await?;

        let grants = self.store.list_grants(admin_id).await?;
        let denied: HashSet<&str> = grants
            .iter()
            .filter(|g| g.is_denial())
            .map(|g| g.permission_key.as_str())
            .collect();

        Ok(self
            .catalog
            .keys()
            .iter()
            .filter(|key| !denied.contains(key.as_str()))
            .cloned()
            .collect())
    }

    /// Check a single permission. Keys outside the catalog are never held.
    pub async fn has_permission(
        &self,
        admin_id: Uuid,
        permission_key: &str,
    ) -> Result<bool, ServiceError> {
        let effective = self.effective_permissions(admin_id).await?;
        Ok(effective.iter().any(|key| key == permission_key))
    }

    /// Erroring form of `has_permission`, for gating read endpoints.
    pub async fn ensure_permission(
        &self,
        admin_id: Uuid,
        permission_key: &str,
    ) -> Result<(), ServiceError> {
        if self.has_permission(admin_id, permission_key).await? {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(permission_key.to_string()))
        }
    }

    /// Set (or flip) one grant. Idempotent on `(admin_user_id, permission_key)`.
    #[tracing::instrument(skip(self), fields(admin_id = %admin_id, permission_key = %permission_key, allowed = allowed))]
    pub async fn set_grant(
        &self,
        admin_id: Uuid,
        permission_key: &str,
        allowed: bool,
        granted_by: Uuid,
    ) -> Result<PermissionGrant, ServiceError> {
        if !self.catalog.contains(permission_key) {
            return Err(ServiceError::InvalidPermission(permission_key.to_string()));
        }

        match self.store.find_user(admin_id).await? {
            Some(user) if user.is_admin() => {}
            _ => return Err(ServiceError::InvalidTarget(admin_id)),
        }

        let grant = PermissionGrant::new(admin_id, permission_key.to_string(), allowed, granted_by);
        let stored = self.store.upsert_grant(&grant).await?;

        tracing::info!(
            grant_id = %stored.grant_id,
            "Permission grant stored"
        );

        Ok(stored)
    }

    /// List an admin's grant rows in permission-key order.
    pub async fn list_grants(&self, admin_id: Uuid) -> Result<Vec<PermissionGrant>, ServiceError> {
        self.require_admin(admin_id).await?;
        self.store.list_grants(admin_id).await
    }

    async fn require_admin(&self, admin_id: Uuid) -> Result<User, ServiceError> {
        match self.store.find_user(admin_id).await? {
            Some(user) if user.is_admin() => Ok(user),
            _ => Err(ServiceError::AdminNotFound),
        }
    }
}
