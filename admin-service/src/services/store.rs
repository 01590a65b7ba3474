//! Storage abstraction over the control-plane tables.
//!
//! `ControlPlaneStore` is the seam between services and persistence. The
//! Postgres implementation lives in `services::database`; `MemoryStore`
//! backs unit and router tests without infrastructure.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::user::EnrollmentState;
use crate::models::{AuditEntry, AuditQuery, Challenge, Notification, PermissionGrant, User};
use crate::services::error::ServiceError;

#[async_trait]
pub trait ControlPlaneStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // Users
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;
    async fn set_user_banned(
        &self,
        user_id: Uuid,
        banned: bool,
    ) -> Result<Option<User>, ServiceError>;
    async fn set_user_role(
        &self,
        user_id: Uuid,
        role_code: &str,
    ) -> Result<Option<User>, ServiceError>;
    async fn set_role_bulk(&self, user_ids: &[Uuid], role_code: &str)
        -> Result<u64, ServiceError>;
    async fn mark_waitlist_contacted(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;
    async fn promote_waitlisted_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    // Permission grants
    async fn upsert_grant(&self, grant: &PermissionGrant)
        -> Result<PermissionGrant, ServiceError>;
    async fn list_grants(&self, admin_user_id: Uuid) -> Result<Vec<PermissionGrant>, ServiceError>;

    // Challenges
    async fn insert_challenge(&self, challenge: &Challenge) -> Result<(), ServiceError>;
    async fn find_challenge(&self, challenge_id: Uuid) -> Result<Option<Challenge>, ServiceError>;
    /// Consume a challenge if it is still live. Returns whether this call
    /// won the transition; a consumed or expired challenge yields false.
    async fn consume_challenge(&self, challenge_id: Uuid) -> Result<bool, ServiceError>;

    // Audit
    async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<(), ServiceError>;
    async fn find_audit_entries(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditEntry>, i64), ServiceError>;

    // Notifications
    async fn insert_notification(&self, notification: &Notification) -> Result<(), ServiceError>;
    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, ServiceError>;
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, User>,
    grants: HashMap<(Uuid, String), PermissionGrant>,
    challenges: HashMap<Uuid, Challenge>,
    audit_entries: Vec<AuditEntry>,
    notifications: Vec<Notification>,
}

/// In-memory store for tests.
///
/// One mutex guards all tables, so conditional writes observe the same
/// state they mutate.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent audit inserts fail, to exercise the absorb path.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, ServiceError> {
        self.inner
            .lock()
            .map_err(|e| ServiceError::InternalString(format!("Memory store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl ControlPlaneStore for MemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let inner = self.lock()?;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        inner.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn set_user_banned(
        &self,
        user_id: Uuid,
        banned: bool,
    ) -> Result<Option<User>, ServiceError> {
        let mut inner = self.lock()?;
        Ok(inner.users.get_mut(&user_id).map(|user| {
            user.banned_flag = banned;
            user.updated_utc = Utc::now();
            user.clone()
        }))
    }

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role_code: &str,
    ) -> Result<Option<User>, ServiceError> {
        let mut inner = self.lock()?;
        Ok(inner.users.get_mut(&user_id).map(|user| {
            user.role_code = role_code.to_string();
            user.updated_utc = Utc::now();
            user.clone()
        }))
    }

    async fn set_role_bulk(
        &self,
        user_ids: &[Uuid],
        role_code: &str,
    ) -> Result<u64, ServiceError> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let mut updated = 0u64;
        for user_id in user_ids {
            if let Some(user) = inner.users.get_mut(user_id) {
                user.role_code = role_code.to_string();
                user.updated_utc = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_waitlist_contacted(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let mut inner = self.lock()?;
        Ok(inner
            .users
            .get_mut(&user_id)
            .filter(|user| user.is_on_waitlist())
            .map(|user| {
                let now = Utc::now();
                user.contacted_utc = Some(now);
                user.enrollment_state_code = EnrollmentState::Invited.as_str().to_string();
                user.updated_utc = now;
                user.clone()
            }))
    }

    async fn promote_waitlisted_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let mut inner = self.lock()?;
        Ok(inner
            .users
            .get_mut(&user_id)
            .filter(|user| user.is_on_waitlist())
            .map(|user| {
                user.enrollment_state_code = EnrollmentState::Enrolled.as_str().to_string();
                user.updated_utc = Utc::now();
                user.clone()
            }))
    }

    async fn upsert_grant(
        &self,
        grant: &PermissionGrant,
    ) -> Result<PermissionGrant, ServiceError> {
        let mut inner = self.lock()?;
        let key = (grant.admin_user_id, grant.permission_key.clone());
        let stored = inner
            .grants
            .entry(key)
            .and_modify(|existing| {
                existing.allowed_flag = grant.allowed_flag;
                existing.granted_by_user_id = grant.granted_by_user_id;
                existing.updated_utc = grant.updated_utc;
            })
            .or_insert_with(|| grant.clone());
        Ok(stored.clone())
    }

    async fn list_grants(
        &self,
        admin_user_id: Uuid,
    ) -> Result<Vec<PermissionGrant>, ServiceError> {
        let inner = self.lock()?;
        let mut grants: Vec<PermissionGrant> = inner
            .grants
            .values()
            .filter(|g| g.admin_user_id == admin_user_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| a.permission_key.cmp(&b.permission_key));
        Ok(grants)
    }

    async fn insert_challenge(&self, challenge: &Challenge) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        inner
            .challenges
            .insert(challenge.challenge_id, challenge.clone());
        Ok(())
    }

    async fn find_challenge(&self, challenge_id: Uuid) -> Result<Option<Challenge>, ServiceError> {
        let inner = self.lock()?;
        Ok(inner.challenges.get(&challenge_id).cloned())
    }

    async fn consume_challenge(&self, challenge_id: Uuid) -> Result<bool, ServiceError> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        match inner.challenges.get_mut(&challenge_id) {
            Some(challenge) if challenge.consumed_utc.is_none() && challenge.expiry_utc > now => {
                challenge.consumed_utc = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<(), ServiceError> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::InternalString(
                "Audit writes disabled".to_string(),
            ));
        }
        let mut inner = self.lock()?;
        inner.audit_entries.push(entry.clone());
        Ok(())
    }

    async fn find_audit_entries(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditEntry>, i64), ServiceError> {
        let inner = self.lock()?;
        let mut matched: Vec<AuditEntry> = inner
            .audit_entries
            .iter()
            .filter(|e| {
                query
                    .actor_user_id
                    .map_or(true, |id| e.actor_user_id == Some(id))
                    && query.action_key.as_deref().map_or(true, |k| e.action_key == k)
                    && query
                        .entity_kind
                        .as_deref()
                        .map_or(true, |k| e.entity_kind == k)
                    && query.entity_id.map_or(true, |id| e.entity_id == Some(id))
                    && query
                        .target_user_id
                        .map_or(true, |id| e.target_user_id == Some(id))
                    && query.from_utc.map_or(true, |t| e.created_utc >= t)
                    && query.to_utc.map_or(true, |t| e.created_utc <= t)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        inner.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, ServiceError> {
        let inner = self.lock()?;
        let mut notifications: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        notifications.truncate(limit.max(0) as usize);
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::Duration;

    fn live_challenge(admin_user_id: Uuid) -> Challenge {
        Challenge::new(
            admin_user_id,
            "USER_BAN".to_string(),
            Some("user".to_string()),
            None,
            None,
            "$argon2id$fake".to_string(),
            Duration::minutes(10),
        )
    }

    #[tokio::test]
    async fn test_upsert_grant_is_idempotent() {
        let store = MemoryStore::new();
        let admin_id = Uuid::new_v4();
        let granter_id = Uuid::new_v4();

        let deny = PermissionGrant::new(admin_id, "users.ban".to_string(), false, granter_id);
        store.upsert_grant(&deny).await.unwrap();

        let allow = PermissionGrant::new(admin_id, "users.ban".to_string(), true, granter_id);
        let stored = store.upsert_grant(&allow).await.unwrap();

        // Same logical row flipped in place, not a second row
        assert_eq!(stored.grant_id, deny.grant_id);
        assert!(stored.allowed_flag);
        assert_eq!(store.list_grants(admin_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consume_challenge_once() {
        let store = MemoryStore::new();
        let challenge = live_challenge(Uuid::new_v4());
        store.insert_challenge(&challenge).await.unwrap();

        assert!(store.consume_challenge(challenge.challenge_id).await.unwrap());
        assert!(!store.consume_challenge(challenge.challenge_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_expired_challenge_fails() {
        let store = MemoryStore::new();
        let mut challenge = live_challenge(Uuid::new_v4());
        challenge.expiry_utc = Utc::now() - Duration::minutes(1);
        store.insert_challenge(&challenge).await.unwrap();

        assert!(!store.consume_challenge(challenge.challenge_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_role_skips_unknown_users() {
        let store = MemoryStore::new();
        let known = User::new("a@example.com".to_string(), None, UserRole::Member);
        store.insert_user(&known).await.unwrap();

        let updated = store
            .set_role_bulk(&[known.user_id, Uuid::new_v4()], "staff")
            .await
            .unwrap();

        assert_eq!(updated, 1);
        let reloaded = store.find_user(known.user_id).await.unwrap().unwrap();
        assert_eq!(reloaded.role_code, "staff");
    }

    #[tokio::test]
    async fn test_promote_requires_waitlist_state() {
        let store = MemoryStore::new();
        let enrolled = User::new("a@example.com".to_string(), None, UserRole::Member);
        let waitlisted = User::waitlisted("b@example.com".to_string(), None);
        store.insert_user(&enrolled).await.unwrap();
        store.insert_user(&waitlisted).await.unwrap();

        assert!(store
            .promote_waitlisted_user(enrolled.user_id)
            .await
            .unwrap()
            .is_none());

        let promoted = store
            .promote_waitlisted_user(waitlisted.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promoted.enrollment_state_code, "enrolled");
    }

    #[tokio::test]
    async fn test_audit_filter_and_paging() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        for i in 0..5 {
            let action = if i % 2 == 0 { "USER_BAN" } else { "USER_UNBAN" };
            let entry = AuditEntry::admin_action(actor, action, "user", None, None, None, None);
            store.insert_audit_entry(&entry).await.unwrap();
        }

        let query = AuditQuery {
            action_key: Some("USER_BAN".to_string()),
            ..Default::default()
        };
        let (page, total) = store.find_audit_entries(&query, 2, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|e| e.action_key == "USER_BAN"));
    }

    #[tokio::test]
    async fn test_fail_audit_writes_toggle() {
        let store = MemoryStore::new();
        store.fail_audit_writes(true);

        let entry = AuditEntry::system_action("USER_BAN", "user", None, None);
        assert!(store.insert_audit_entry(&entry).await.is_err());

        store.fail_audit_writes(false);
        assert!(store.insert_audit_entry(&entry).await.is_ok());
    }
}
