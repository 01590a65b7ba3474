//! Action registry - governed admin actions and their confirmation policies.

use serde::{Deserialize, Serialize};

use crate::services::catalog::PermissionCatalog;
use crate::services::error::ServiceError;

/// When a confirmation challenge must be passed before an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationPolicy {
    /// The action never runs without a verified challenge.
    Required,
    /// A challenge answer is verified when supplied, otherwise skipped.
    IfSupplied,
}

/// Governed admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminAction {
    UserBan,
    UserUnban,
    UserRoleChange,
    UserBulkRoleChange,
    WaitlistContact,
    WaitlistPromote,
    PermissionGrantSet,
}

impl AdminAction {
    pub const ALL: [AdminAction; 7] = [
        AdminAction::UserBan,
        AdminAction::UserUnban,
        AdminAction::UserRoleChange,
        AdminAction::UserBulkRoleChange,
        AdminAction::WaitlistContact,
        AdminAction::WaitlistPromote,
        AdminAction::PermissionGrantSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::UserBan => "USER_BAN",
            AdminAction::UserUnban => "USER_UNBAN",
            AdminAction::UserRoleChange => "USER_ROLE_CHANGE",
            AdminAction::UserBulkRoleChange => "USER_BULK_ROLE_CHANGE",
            AdminAction::WaitlistContact => "WAITLIST_CONTACT",
            AdminAction::WaitlistPromote => "WAITLIST_PROMOTE",
            AdminAction::PermissionGrantSet => "PERMISSION_GRANT_SET",
        }
    }

    /// Permission an admin must hold to run this action.
    pub fn required_permission(&self) -> &'static str {
        match self {
            AdminAction::UserBan | AdminAction::UserUnban => "users.ban",
            AdminAction::UserRoleChange => "users.edit",
            AdminAction::UserBulkRoleChange => "users.bulk_edit",
            AdminAction::WaitlistContact | AdminAction::WaitlistPromote => "waitlist.manage",
            AdminAction::PermissionGrantSet => "permissions.manage",
        }
    }

    /// Whether this action demands a confirmation challenge.
    pub fn confirmation(&self) -> ConfirmationPolicy {
        match self {
            AdminAction::UserBan
            | AdminAction::UserUnban
            | AdminAction::UserBulkRoleChange
            | AdminAction::WaitlistPromote
            | AdminAction::PermissionGrantSet => ConfirmationPolicy::Required,
            AdminAction::UserRoleChange | AdminAction::WaitlistContact => {
                ConfirmationPolicy::IfSupplied
            }
        }
    }

    /// Kind of entity this action operates on.
    pub fn entity_kind(&self) -> &'static str {
        match self {
            AdminAction::PermissionGrantSet => "permission_grant",
            _ => "user",
        }
    }

    /// Human-readable phrase for delivery messages.
    pub fn describe(&self) -> &'static str {
        match self {
            AdminAction::UserBan => "ban a user",
            AdminAction::UserUnban => "unban a user",
            AdminAction::UserRoleChange => "change a user's role",
            AdminAction::UserBulkRoleChange => "change roles for multiple users",
            AdminAction::WaitlistContact => "contact a waitlisted user",
            AdminAction::WaitlistPromote => "promote a waitlisted user",
            AdminAction::PermissionGrantSet => "change an admin's permissions",
        }
    }
}

impl std::str::FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER_BAN" => Ok(AdminAction::UserBan),
            "USER_UNBAN" => Ok(AdminAction::UserUnban),
            "USER_ROLE_CHANGE" => Ok(AdminAction::UserRoleChange),
            "USER_BULK_ROLE_CHANGE" => Ok(AdminAction::UserBulkRoleChange),
            "WAITLIST_CONTACT" => Ok(AdminAction::WaitlistContact),
            "WAITLIST_PROMOTE" => Ok(AdminAction::WaitlistPromote),
            "PERMISSION_GRANT_SET" => Ok(AdminAction::PermissionGrantSet),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

/// Everything the gateway needs to know about one action.
#[derive(Debug, Clone, Copy)]
pub struct ActionPolicy {
    pub required_permission: &'static str,
    pub confirmation: ConfirmationPolicy,
    pub entity_kind: &'static str,
}

/// Registry of governed actions, checked against the permission catalog.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: Vec<AdminAction>,
}

impl ActionRegistry {
    /// Build the registry, verifying every action's permission is in the catalog.
    pub fn builtin(catalog: &PermissionCatalog) -> Result<Self, ServiceError> {
        for action in AdminAction::ALL {
            let permission = action.required_permission();
            if !catalog.contains(permission) {
                return Err(ServiceError::InternalString(format!(
                    "Action {} requires unknown permission {}",
                    action.as_str(),
                    permission
                )));
            }
        }

        Ok(Self {
            actions: AdminAction::ALL.to_vec(),
        })
    }

    /// Resolve an action key from the wire.
    pub fn resolve(&self, action_key: &str) -> Result<AdminAction, ServiceError> {
        action_key
            .parse::<AdminAction>()
            .map_err(|_| ServiceError::UnknownAction(action_key.to_string()))
    }

    /// Policy for an action. Total over the enum.
    pub fn policy_for(&self, action: AdminAction) -> ActionPolicy {
        ActionPolicy {
            required_permission: action.required_permission(),
            confirmation: action.confirmation(),
            entity_kind: action.entity_kind(),
        }
    }

    /// All registered actions.
    pub fn actions(&self) -> &[AdminAction] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_matches_catalog() {
        let catalog = PermissionCatalog::builtin();
        let registry = ActionRegistry::builtin(&catalog).unwrap();
        assert_eq!(registry.actions().len(), 7);
    }

    #[test]
    fn test_builtin_rejects_catalog_without_required_keys() {
        let partial = PermissionCatalog::new(1, vec!["users.view".to_string()]).unwrap();
        assert!(ActionRegistry::builtin(&partial).is_err());
    }

    #[test]
    fn test_policy_for_is_total() {
        let catalog = PermissionCatalog::builtin();
        let registry = ActionRegistry::builtin(&catalog).unwrap();

        for action in AdminAction::ALL {
            let policy = registry.policy_for(action);
            assert!(catalog.contains(policy.required_permission));
            assert!(!policy.entity_kind.is_empty());
        }
    }

    #[test]
    fn test_resolve_known_and_unknown_keys() {
        let catalog = PermissionCatalog::builtin();
        let registry = ActionRegistry::builtin(&catalog).unwrap();

        assert_eq!(registry.resolve("USER_BAN").unwrap(), AdminAction::UserBan);
        assert!(matches!(
            registry.resolve("USER_DELETE"),
            Err(ServiceError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_action_key_round_trip() {
        for action in AdminAction::ALL {
            assert_eq!(action.as_str().parse::<AdminAction>(), Ok(action));
        }
    }

    #[test]
    fn test_confirmation_policies() {
        assert_eq!(
            AdminAction::UserBan.confirmation(),
            ConfirmationPolicy::Required
        );
        assert_eq!(
            AdminAction::UserRoleChange.confirmation(),
            ConfirmationPolicy::IfSupplied
        );
        assert_eq!(
            AdminAction::WaitlistContact.confirmation(),
            ConfirmationPolicy::IfSupplied
        );
    }

    #[test]
    fn test_entity_kinds() {
        assert_eq!(AdminAction::UserBan.entity_kind(), "user");
        assert_eq!(AdminAction::PermissionGrantSet.entity_kind(), "permission_grant");
    }
}
