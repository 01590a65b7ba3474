//! Challenge model - one-time confirmation codes for sensitive actions.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Challenge entity.
///
/// Only the one-way hash of the confirmation code is stored. The plaintext
/// code exists solely in the delivery channel (email or in-app notification)
/// and in the admin's hands.
#[derive(Debug, Clone, FromRow)]
pub struct Challenge {
    pub challenge_id: Uuid,
    pub admin_user_id: Uuid,
    pub action_key: String,
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub reason_text: Option<String>,
    pub code_hash_text: String,
    pub expiry_utc: DateTime<Utc>,
    pub consumed_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Challenge {
    /// Create a new challenge expiring after `ttl`.
    pub fn new(
        admin_user_id: Uuid,
        action_key: String,
        entity_kind: Option<String>,
        entity_id: Option<Uuid>,
        reason_text: Option<String>,
        code_hash_text: String,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            challenge_id: Uuid::new_v4(),
            admin_user_id,
            action_key,
            entity_kind,
            entity_id,
            reason_text,
            code_hash_text,
            expiry_utc: now + ttl,
            consumed_utc: None,
            created_utc: now,
        }
    }

    /// Check if challenge can still be verified (not expired, not consumed).
    pub fn is_live(&self) -> bool {
        !self.is_expired() && !self.is_consumed()
    }

    /// Check if challenge has been consumed.
    pub fn is_consumed(&self) -> bool {
        self.consumed_utc.is_some()
    }

    /// Check if challenge has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiry_utc
    }

    /// Check if challenge was issued to this admin for this action.
    pub fn matches(&self, admin_user_id: Uuid, action_key: &str) -> bool {
        self.admin_user_id == admin_user_id && self.action_key == action_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_challenge() -> Challenge {
        Challenge::new(
            Uuid::new_v4(),
            "USER_BAN".to_string(),
            Some("user".to_string()),
            Some(Uuid::new_v4()),
            None,
            "$argon2id$fake".to_string(),
            Duration::minutes(10),
        )
    }

    #[test]
    fn test_new_challenge_is_live() {
        let challenge = sample_challenge();
        assert!(challenge.is_live());
        assert!(!challenge.is_consumed());
        assert!(!challenge.is_expired());
    }

    #[test]
    fn test_consumed_challenge_is_not_live() {
        let mut challenge = sample_challenge();
        challenge.consumed_utc = Some(Utc::now());
        assert!(challenge.is_consumed());
        assert!(!challenge.is_live());
    }

    #[test]
    fn test_expired_challenge_is_not_live() {
        let mut challenge = sample_challenge();
        challenge.expiry_utc = Utc::now() - Duration::minutes(1);
        assert!(challenge.is_expired());
        assert!(!challenge.is_live());
    }

    #[test]
    fn test_matches_admin_and_action() {
        let challenge = sample_challenge();
        assert!(challenge.matches(challenge.admin_user_id, "USER_BAN"));
        assert!(!challenge.matches(challenge.admin_user_id, "USER_UNBAN"));
        assert!(!challenge.matches(Uuid::new_v4(), "USER_BAN"));
    }
}
