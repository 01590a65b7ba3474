//! Challenge engine - one-time confirmation codes for sensitive actions.
//!
//! A challenge is issued to one admin for one action, carries an argon2 hash
//! of a 6-digit code, and can be consumed exactly once before its expiry.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Challenge, Notification, User};
use crate::services::actions::AdminAction;
use crate::services::email::EmailProvider;
use crate::services::error::ServiceError;
use crate::services::metrics;
use crate::services::store::ControlPlaneStore;
use crate::utils::codes::{self, ChallengeCode};

/// Input for issuing a challenge.
#[derive(Debug, Clone)]
pub struct IssueChallenge {
    pub action: AdminAction,
    pub entity_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// What the caller gets back. Never carries the plaintext code.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub challenge_id: Uuid,
    pub action_key: String,
    pub expiry_utc: DateTime<Utc>,
}

/// A supplied answer to a pending challenge.
#[derive(Debug, Clone)]
pub struct ChallengeAnswer {
    pub challenge_id: Uuid,
    pub code: ChallengeCode,
}

#[derive(Clone)]
pub struct ChallengeService {
    store: Arc<dyn ControlPlaneStore>,
    email: Arc<dyn EmailProvider>,
    ttl: Duration,
}

impl ChallengeService {
    pub fn new(
        store: Arc<dyn ControlPlaneStore>,
        email: Arc<dyn EmailProvider>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            store,
            email,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl.num_minutes()
    }

    /// Issue a challenge for `admin` and deliver the code out of band.
    ///
    /// Delivery is best-effort: an email failure falls back to an in-app
    /// notification, and a failure there is logged but never fails issuance.
    #[tracing::instrument(skip(self, admin, input), fields(admin_id = %admin.user_id, action_key = %input.action.as_str()))]
    pub async fn issue(
        &self,
        admin: &User,
        input: IssueChallenge,
    ) -> Result<IssuedChallenge, ServiceError> {
        let code = codes::generate_code();
        let code_hash = codes::hash_code(&code)?;

        let challenge = Challenge::new(
            admin.user_id,
            input.action.as_str().to_string(),
            Some(input.action.entity_kind().to_string()),
            input.entity_id,
            input.reason,
            code_hash,
            self.ttl,
        );
        self.store.insert_challenge(&challenge).await?;
        metrics::inc_challenges_issued();

        self.deliver_code(admin, &code, input.action).await;

        tracing::info!(
            challenge_id = %challenge.challenge_id,
            expiry_utc = %challenge.expiry_utc,
            "Challenge issued"
        );

        Ok(IssuedChallenge {
            challenge_id: challenge.challenge_id,
            action_key: challenge.action_key,
            expiry_utc: challenge.expiry_utc,
        })
    }

    /// Verify an answer for `(admin_id, action)` and consume the challenge.
    ///
    /// Consumption is a single conditional write: of all concurrent verifiers
    /// holding the right code, exactly one wins the transition.
    #[tracing::instrument(skip(self, answer), fields(admin_id = %admin_id, action_key = %action.as_str()))]
    pub async fn verify(
        &self,
        admin_id: Uuid,
        action: AdminAction,
        answer: Option<&ChallengeAnswer>,
    ) -> Result<(), ServiceError> {
        let answer = match answer {
            Some(answer) => answer,
            None => return Err(ServiceError::ChallengeRequired(action.as_str().to_string())),
        };

        let challenge = match self.store.find_challenge(answer.challenge_id).await? {
            Some(challenge) => challenge,
            None => {
                metrics::inc_challenge_verify_failure("invalid");
                return Err(ServiceError::ChallengeInvalid);
            }
        };

        if !challenge.matches(admin_id, action.as_str()) || !challenge.is_live() {
            metrics::inc_challenge_verify_failure("invalid");
            return Err(ServiceError::ChallengeInvalid);
        }

        // A wrong code must not consume the challenge; the admin can retry
        // with the code they were actually sent.
        if codes::verify_code(&answer.code, &challenge.code_hash_text).is_err() {
            metrics::inc_challenge_verify_failure("code_invalid");
            return Err(ServiceError::ChallengeCodeInvalid);
        }

        if !self.store.consume_challenge(answer.challenge_id).await? {
            // Lost the race or expired between read and write
            metrics::inc_challenge_verify_failure("invalid");
            return Err(ServiceError::ChallengeInvalid);
        }

        tracing::info!(challenge_id = %answer.challenge_id, "Challenge verified");
        Ok(())
    }

    async fn deliver_code(&self, admin: &User, code: &ChallengeCode, action: AdminAction) {
        let sent = self
            .email
            .send_challenge_code(
                &admin.email,
                code,
                action.describe(),
                self.ttl_minutes(),
            )
            .await;

        let Err(e) = sent else { return };

        tracing::warn!(
            admin_id = %admin.user_id,
            error = %e,
            "Challenge code email failed, writing in-app notification"
        );
        metrics::inc_challenge_delivery_fallback();

        let notification = Notification::new(
            admin.user_id,
            "Your admin confirmation code".to_string(),
            format!(
                "To {}, enter code {}. It expires in {} minutes and can be used once.",
                action.describe(),
                code.as_str(),
                self.ttl_minutes()
            ),
        );
        if let Err(e) = self.store.insert_notification(&notification).await {
            tracing::error!(
                admin_id = %admin.user_id,
                error = %e,
                "Challenge code could not be delivered on any channel"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::services::email::MockEmailService;
    use crate::services::store::MemoryStore;

    struct Harness {
        service: ChallengeService,
        store: Arc<MemoryStore>,
        email: Arc<MockEmailService>,
        admin: User,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let service = ChallengeService::new(store.clone(), email.clone(), 10);

        let admin = User::new("admin@example.com".to_string(), None, UserRole::Admin);
        store.insert_user(&admin).await.unwrap();

        Harness {
            service,
            store,
            email,
            admin,
        }
    }

    fn answer(challenge_id: Uuid, code: &str) -> ChallengeAnswer {
        ChallengeAnswer {
            challenge_id,
            code: ChallengeCode::new(code.to_string()),
        }
    }

    fn extract_code(text: &str) -> String {
        text.split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == codes::CODE_LENGTH)
            .expect("no code in text")
            .to_string()
    }

    #[tokio::test]
    async fn test_issue_then_verify_once() {
        let h = harness().await;
        let issued = h
            .service
            .issue(
                &h.admin,
                IssueChallenge {
                    action: AdminAction::UserBan,
                    entity_id: None,
                    reason: Some("abuse".to_string()),
                },
            )
            .await
            .unwrap();

        let code = h.email.last_code().unwrap();
        let first = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserBan,
                Some(&answer(issued.challenge_id, &code)),
            )
            .await;
        assert!(first.is_ok());

        // Replay with the same id and code
        let replay = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserBan,
                Some(&answer(issued.challenge_id, &code)),
            )
            .await;
        assert!(matches!(replay, Err(ServiceError::ChallengeInvalid)));
    }

    #[tokio::test]
    async fn test_missing_answer_requires_challenge() {
        let h = harness().await;
        let result = h
            .service
            .verify(h.admin.user_id, AdminAction::UserBan, None)
            .await;
        assert!(matches!(result, Err(ServiceError::ChallengeRequired(_))));
    }

    #[tokio::test]
    async fn test_expired_challenge_fails_with_correct_code() {
        let h = harness().await;
        let code = ChallengeCode::new("271828".to_string());
        let code_hash = codes::hash_code(&code).unwrap();
        let challenge = Challenge::new(
            h.admin.user_id,
            "USER_BAN".to_string(),
            Some("user".to_string()),
            None,
            None,
            code_hash,
            Duration::minutes(-1),
        );
        h.store.insert_challenge(&challenge).await.unwrap();

        let result = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserBan,
                Some(&answer(challenge.challenge_id, "271828")),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::ChallengeInvalid)));
    }

    #[tokio::test]
    async fn test_stored_row_never_contains_plaintext_code() {
        let h = harness().await;
        let issued = h
            .service
            .issue(
                &h.admin,
                IssueChallenge {
                    action: AdminAction::UserBan,
                    entity_id: None,
                    reason: None,
                },
            )
            .await
            .unwrap();

        let code = h.email.last_code().unwrap();
        let stored = h
            .store
            .find_challenge(issued.challenge_id)
            .await
            .unwrap()
            .unwrap();

        assert!(stored.code_hash_text.starts_with("$argon2"));
        assert!(!stored.code_hash_text.contains(&code));
    }

    #[tokio::test]
    async fn test_concurrent_verifications_single_winner() {
        let h = harness().await;
        let issued = h
            .service
            .issue(
                &h.admin,
                IssueChallenge {
                    action: AdminAction::UserBan,
                    entity_id: None,
                    reason: None,
                },
            )
            .await
            .unwrap();
        let code = h.email.last_code().unwrap();

        let a1 = answer(issued.challenge_id, &code);
        let a2 = answer(issued.challenge_id, &code);
        let (r1, r2) = tokio::join!(
            h.service
                .verify(h.admin.user_id, AdminAction::UserBan, Some(&a1)),
            h.service
                .verify(h.admin.user_id, AdminAction::UserBan, Some(&a2)),
        );

        assert!(r1.is_ok() != r2.is_ok(), "exactly one verification must win");
        let loser = if r1.is_ok() { r2 } else { r1 };
        assert!(matches!(loser, Err(ServiceError::ChallengeInvalid)));
    }

    #[tokio::test]
    async fn test_challenge_bound_to_action() {
        let h = harness().await;
        let issued = h
            .service
            .issue(
                &h.admin,
                IssueChallenge {
                    action: AdminAction::UserBan,
                    entity_id: None,
                    reason: None,
                },
            )
            .await
            .unwrap();
        let code = h.email.last_code().unwrap();

        let result = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserUnban,
                Some(&answer(issued.challenge_id, &code)),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::ChallengeInvalid)));
    }

    #[tokio::test]
    async fn test_wrong_code_leaves_challenge_live() {
        let h = harness().await;
        let issued = h
            .service
            .issue(
                &h.admin,
                IssueChallenge {
                    action: AdminAction::UserBan,
                    entity_id: None,
                    reason: None,
                },
            )
            .await
            .unwrap();
        let code = h.email.last_code().unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let bad = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserBan,
                Some(&answer(issued.challenge_id, wrong)),
            )
            .await;
        assert!(matches!(bad, Err(ServiceError::ChallengeCodeInvalid)));

        // The failed attempt must not have consumed the challenge
        let good = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserBan,
                Some(&answer(issued.challenge_id, &code)),
            )
            .await;
        assert!(good.is_ok());
    }

    #[tokio::test]
    async fn test_email_failure_falls_back_to_notification() {
        let h = harness().await;
        h.email.fail_sends(true);

        let issued = h
            .service
            .issue(
                &h.admin,
                IssueChallenge {
                    action: AdminAction::UserBan,
                    entity_id: None,
                    reason: None,
                },
            )
            .await
            .unwrap();

        let notifications = h
            .store
            .list_notifications(h.admin.user_id, 10)
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);

        // The fallback notification carries a usable code
        let code = extract_code(&notifications[0].body_text);
        let result = h
            .service
            .verify(
                h.admin.user_id,
                AdminAction::UserBan,
                Some(&answer(issued.challenge_id, &code)),
            )
            .await;
        assert!(result.is_ok());
    }
}
