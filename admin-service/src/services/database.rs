//! PostgreSQL store for the admin control plane.
//!
//! Uses sqlx with runtime-checked queries against the migration schema.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{AuditEntry, AuditQuery, Challenge, Notification, PermissionGrant, User};
use crate::services::error::ServiceError;
use crate::services::store::ControlPlaneStore;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ControlPlaneStore for Database {
    /// Health check - ping the database.
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    // ==================== User Operations ====================

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, role_code, banned_flag,
                               enrollment_state_code, contacted_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.role_code)
        .bind(user.banned_flag)
        .bind(&user.enrollment_state_code)
        .bind(user.contacted_utc)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_user_banned(
        &self,
        user_id: Uuid,
        banned: bool,
    ) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET banned_flag = $2, updated_utc = NOW() WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(banned)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role_code: &str,
    ) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role_code = $2, updated_utc = NOW() WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(role_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_role_bulk(
        &self,
        user_ids: &[Uuid],
        role_code: &str,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE users SET role_code = $2, updated_utc = NOW() WHERE user_id = ANY($1)",
        )
        .bind(user_ids)
        .bind(role_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_waitlist_contacted(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET enrollment_state_code = 'invited', contacted_utc = NOW(), updated_utc = NOW()
            WHERE user_id = $1 AND enrollment_state_code IN ('waitlisted', 'invited')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn promote_waitlisted_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET enrollment_state_code = 'enrolled', updated_utc = NOW()
            WHERE user_id = $1 AND enrollment_state_code IN ('waitlisted', 'invited')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // ==================== Permission Grant Operations ====================

    async fn upsert_grant(
        &self,
        grant: &PermissionGrant,
    ) -> Result<PermissionGrant, ServiceError> {
        let stored = sqlx::query_as::<_, PermissionGrant>(
            r#"
            INSERT INTO permission_grants (grant_id, admin_user_id, permission_key, allowed_flag,
                                           granted_by_user_id, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (admin_user_id, permission_key)
            DO UPDATE SET allowed_flag = EXCLUDED.allowed_flag,
                          granted_by_user_id = EXCLUDED.granted_by_user_id,
                          updated_utc = EXCLUDED.updated_utc
            RETURNING *
            "#,
        )
        .bind(grant.grant_id)
        .bind(grant.admin_user_id)
        .bind(&grant.permission_key)
        .bind(grant.allowed_flag)
        .bind(grant.granted_by_user_id)
        .bind(grant.created_utc)
        .bind(grant.updated_utc)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn list_grants(
        &self,
        admin_user_id: Uuid,
    ) -> Result<Vec<PermissionGrant>, ServiceError> {
        let grants = sqlx::query_as::<_, PermissionGrant>(
            "SELECT * FROM permission_grants WHERE admin_user_id = $1 ORDER BY permission_key",
        )
        .bind(admin_user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(grants)
    }

    // ==================== Challenge Operations ====================

    async fn insert_challenge(&self, challenge: &Challenge) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO challenges (challenge_id, admin_user_id, action_key, entity_kind,
                                    entity_id, reason_text, code_hash_text, expiry_utc,
                                    consumed_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(challenge.challenge_id)
        .bind(challenge.admin_user_id)
        .bind(&challenge.action_key)
        .bind(&challenge.entity_kind)
        .bind(challenge.entity_id)
        .bind(&challenge.reason_text)
        .bind(&challenge.code_hash_text)
        .bind(challenge.expiry_utc)
        .bind(challenge.consumed_utc)
        .bind(challenge.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_challenge(&self, challenge_id: Uuid) -> Result<Option<Challenge>, ServiceError> {
        let challenge =
            sqlx::query_as::<_, Challenge>("SELECT * FROM challenges WHERE challenge_id = $1")
                .bind(challenge_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(challenge)
    }

    async fn consume_challenge(&self, challenge_id: Uuid) -> Result<bool, ServiceError> {
        // Single conditional write; concurrent verifiers race on rows_affected.
        let result = sqlx::query(
            r#"
            UPDATE challenges SET consumed_utc = NOW()
            WHERE challenge_id = $1 AND consumed_utc IS NULL AND expiry_utc > NOW()
            "#,
        )
        .bind(challenge_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ==================== Audit Operations ====================

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (entry_id, actor_user_id, action_key, entity_kind,
                                       entity_id, target_user_id, reason_text, metadata,
                                       created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.actor_user_id)
        .bind(&entry.action_key)
        .bind(&entry.entity_kind)
        .bind(entry.entity_id)
        .bind(entry.target_user_id)
        .bind(&entry.reason_text)
        .bind(&entry.metadata)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_audit_entries(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditEntry>, i64), ServiceError> {
        // Build dynamic WHERE clause
        let mut conditions: Vec<String> = Vec::new();
        let mut param_idx = 1;

        if query.actor_user_id.is_some() {
            conditions.push(format!("actor_user_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.action_key.is_some() {
            conditions.push(format!("action_key = ${}", param_idx));
            param_idx += 1;
        }
        if query.entity_kind.is_some() {
            conditions.push(format!("entity_kind = ${}", param_idx));
            param_idx += 1;
        }
        if query.entity_id.is_some() {
            conditions.push(format!("entity_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.target_user_id.is_some() {
            conditions.push(format!("target_user_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.from_utc.is_some() {
            conditions.push(format!("created_utc >= ${}", param_idx));
            param_idx += 1;
        }
        if query.to_utc.is_some() {
            conditions.push(format!("created_utc <= ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        // Count query
        let count_query = format!("SELECT COUNT(*) FROM audit_entries WHERE {}", where_clause);

        // Data query
        let data_query = format!(
            "SELECT * FROM audit_entries WHERE {} ORDER BY created_utc DESC LIMIT ${} OFFSET ${}",
            where_clause,
            param_idx,
            param_idx + 1
        );

        // Build and execute count query
        let mut count_q = sqlx::query_as::<_, (i64,)>(&count_query);
        if let Some(actor) = query.actor_user_id {
            count_q = count_q.bind(actor);
        }
        if let Some(action) = &query.action_key {
            count_q = count_q.bind(action);
        }
        if let Some(kind) = &query.entity_kind {
            count_q = count_q.bind(kind);
        }
        if let Some(entity) = query.entity_id {
            count_q = count_q.bind(entity);
        }
        if let Some(target) = query.target_user_id {
            count_q = count_q.bind(target);
        }
        if let Some(from) = query.from_utc {
            count_q = count_q.bind(from);
        }
        if let Some(to) = query.to_utc {
            count_q = count_q.bind(to);
        }

        let (total,) = count_q.fetch_one(&self.pool).await?;

        // Build and execute data query
        let mut data_q = sqlx::query_as::<_, AuditEntry>(&data_query);
        if let Some(actor) = query.actor_user_id {
            data_q = data_q.bind(actor);
        }
        if let Some(action) = &query.action_key {
            data_q = data_q.bind(action);
        }
        if let Some(kind) = &query.entity_kind {
            data_q = data_q.bind(kind);
        }
        if let Some(entity) = query.entity_id {
            data_q = data_q.bind(entity);
        }
        if let Some(target) = query.target_user_id {
            data_q = data_q.bind(target);
        }
        if let Some(from) = query.from_utc {
            data_q = data_q.bind(from);
        }
        if let Some(to) = query.to_utc {
            data_q = data_q.bind(to);
        }

        let entries = data_q
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((entries, total))
    }

    // ==================== Notification Operations ====================

    async fn insert_notification(&self, notification: &Notification) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (notification_id, user_id, title_text, body_text,
                                       read_flag, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(notification.notification_id)
        .bind(notification.user_id)
        .bind(&notification.title_text)
        .bind(&notification.body_text)
        .bind(notification.read_flag)
        .bind(notification.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Notification>, ServiceError> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_utc DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }
}
