//! Audit service - append-only trail with absorb-on-failure writes.

use std::sync::Arc;

use crate::models::{AuditEntry, AuditQuery};
use crate::services::error::ServiceError;
use crate::services::metrics;
use crate::services::store::ControlPlaneStore;

/// Hard cap on one audit page.
pub const MAX_PAGE_SIZE: i64 = 200;
/// Page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn ControlPlaneStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn ControlPlaneStore>) -> Self {
        Self { store }
    }

    /// Append an entry to the trail.
    ///
    /// Never fails the caller: a store error is logged and counted, and the
    /// governed action proceeds. The write is awaited, not detached.
    pub async fn append(&self, entry: AuditEntry) {
        if let Err(e) = self.store.insert_audit_entry(&entry).await {
            metrics::inc_audit_write_failure();
            tracing::error!(
                entry_id = %entry.entry_id,
                action_key = %entry.action_key,
                error = %e,
                "Failed to persist audit entry"
            );
        }
    }

    /// Query the trail, newest first. `limit` is clamped to the page cap.
    pub async fn query(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditEntry>, i64), ServiceError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = offset.max(0);
        self.store.find_audit_entries(query, limit, offset).await
    }
}
