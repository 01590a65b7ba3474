//! Action gateway - the single enforcement point for governed admin actions.
//!
//! Every sensitive mutation flows through `execute`: permission check,
//! confirmation policy, the mutation itself, then the audit write. Handlers
//! supply the mutation as a closure and never talk to the grant or challenge
//! services directly.

use serde_json::json;
use std::future::Future;
use uuid::Uuid;

use crate::models::{AuditEntry, User};
use crate::services::actions::{ActionRegistry, AdminAction, ConfirmationPolicy};
use crate::services::audit::AuditService;
use crate::services::challenge::{ChallengeAnswer, ChallengeService};
use crate::services::error::ServiceError;
use crate::services::grants::GrantService;

/// One governed request passing through the gateway.
#[derive(Debug)]
pub struct ActionRequest {
    pub actor: User,
    pub action: AdminAction,
    pub answer: Option<ChallengeAnswer>,
    pub reason: Option<String>,
    /// Entity refs known before the mutation runs; used for the forensic
    /// entry when the mutation fails.
    pub entity_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
}

/// What a successful mutation hands back for auditing.
pub struct Mutation<T> {
    pub value: T,
    entity_id: Option<Uuid>,
    target_user_id: Option<Uuid>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl<T> Mutation<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            entity_id: None,
            target_user_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn entity(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn target(mut self, target_user_id: Uuid) -> Self {
        self.target_user_id = Some(target_user_id);
        self
    }

    /// Attach one metadata field (old/new values, counts, and the like).
    pub fn note(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

#[derive(Clone)]
pub struct ActionGateway {
    registry: ActionRegistry,
    grants: GrantService,
    challenges: ChallengeService,
    audit: AuditService,
}

impl ActionGateway {
    pub fn new(
        registry: ActionRegistry,
        grants: GrantService,
        challenges: ChallengeService,
        audit: AuditService,
    ) -> Self {
        Self {
            registry,
            grants,
            challenges,
            audit,
        }
    }

    /// Run `mutate` under the full protocol.
    ///
    /// Permission and confirmation failures return before the mutation runs.
    /// A mutation failure propagates unchanged but still leaves a forensic
    /// audit entry with `outcome = "failed"`.
    #[tracing::instrument(skip_all, fields(actor_id = %req.actor.user_id, action_key = %req.action.as_str()))]
    pub async fn execute<T, F, Fut>(&self, req: ActionRequest, mutate: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Mutation<T>, ServiceError>>,
    {
        let policy = self.registry.policy_for(req.action);

        if !self
            .grants
            .has_permission(req.actor.user_id, policy.required_permission)
            .await?
        {
            tracing::warn!(
                permission = %policy.required_permission,
                "Action denied: missing permission"
            );
            return Err(ServiceError::Forbidden(
                policy.required_permission.to_string(),
            ));
        }

        let consumed_challenge = match policy.confirmation {
            ConfirmationPolicy::Required => {
                self.challenges
                    .verify(req.actor.user_id, req.action, req.answer.as_ref())
                    .await?;
                req.answer.as_ref().map(|answer| answer.challenge_id)
            }
            ConfirmationPolicy::IfSupplied => match req.answer.as_ref() {
                Some(answer) => {
                    self.challenges
                        .verify(req.actor.user_id, req.action, Some(answer))
                        .await?;
                    Some(answer.challenge_id)
                }
                None => None,
            },
        };

        let mutation = match mutate().await {
            Ok(mutation) => mutation,
            Err(e) => {
                self.audit
                    .append(AuditEntry::admin_action(
                        req.actor.user_id,
                        req.action.as_str(),
                        policy.entity_kind,
                        req.entity_id,
                        req.target_user_id,
                        req.reason,
                        Some(failure_metadata(&e, consumed_challenge)),
                    ))
                    .await;
                return Err(e);
            }
        };

        let mut metadata = mutation.metadata;
        metadata.insert("outcome".to_string(), json!("success"));
        if let Some(challenge_id) = consumed_challenge {
            metadata.insert("challenge_id".to_string(), json!(challenge_id));
        }

        self.audit
            .append(AuditEntry::admin_action(
                req.actor.user_id,
                req.action.as_str(),
                policy.entity_kind,
                mutation.entity_id,
                mutation.target_user_id,
                req.reason,
                Some(serde_json::Value::Object(metadata)),
            ))
            .await;

        Ok(mutation.value)
    }
}

fn failure_metadata(
    error: &ServiceError,
    consumed_challenge: Option<Uuid>,
) -> serde_json::Value {
    let mut metadata = serde_json::Map::new();
    metadata.insert("outcome".to_string(), json!("failed"));
    metadata.insert("error".to_string(), json!(error.to_string()));
    if let Some(challenge_id) = consumed_challenge {
        metadata.insert("challenge_id".to_string(), json!(challenge_id));
    }
    serde_json::Value::Object(metadata)
}
