//! Permission catalog - the compiled-in registry of known permission keys.

use std::collections::HashSet;

use crate::services::error::ServiceError;

/// Every permission the control plane knows about.
///
/// The catalog is fixed at startup. Grants reference these keys; a grant
/// against a key outside the catalog is rejected up front.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    version: u32,
    keys: Vec<String>,
    index: HashSet<String>,
}

impl PermissionCatalog {
    /// Build a catalog from explicit keys.
    ///
    /// Rejects an empty catalog and duplicate keys.
    pub fn new(version: u32, keys: Vec<String>) -> Result<Self, ServiceError> {
        if keys.is_empty() {
            return Err(ServiceError::InternalString(
                "Permission catalog cannot be empty".to_string(),
            ));
        }

        let mut index = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !index.insert(key.clone()) {
                return Err(ServiceError::InternalString(format!(
                    "Duplicate permission key: {}",
                    key
                )));
            }
        }

        Ok(Self {
            version,
            keys,
            index,
        })
    }

    /// The built-in catalog, version 1.
    pub fn builtin() -> Self {
        let keys = [
            "users.view",
            "users.edit",
            "users.ban",
            "users.bulk_edit",
            "waitlist.manage",
            "permissions.view",
            "permissions.manage",
            "audit.view",
        ]
        .iter()
        .map(|key| key.to_string())
        .collect();

        match Self::new(1, keys) {
            Ok(catalog) => catalog,
            Err(e) => panic!("Built-in permission catalog is invalid: {}", e),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Check if a key is in the catalog.
    pub fn contains(&self, permission_key: &str) -> bool {
        self.index.contains(permission_key)
    }

    /// All permission keys, in catalog order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
