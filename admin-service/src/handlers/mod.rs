//! HTTP handlers for admin-service.

pub mod audit;
pub mod challenges;
pub mod metrics;
pub mod notifications;
pub mod permissions;
pub mod users;
pub mod waitlist;

pub use audit::*;
pub use challenges::*;
pub use metrics::*;
pub use notifications::*;
pub use permissions::*;
pub use users::*;
pub use waitlist::*;

use crate::services::ChallengeAnswer;
use crate::utils::codes::ChallengeCode;
use uuid::Uuid;

/// A confirmation answer is the id *and* the code; anything less counts as
/// no answer at all.
pub(crate) fn challenge_answer(
    challenge_id: Option<Uuid>,
    code: Option<String>,
) -> Option<ChallengeAnswer> {
    match (challenge_id, code) {
        (Some(challenge_id), Some(code)) => Some(ChallengeAnswer {
            challenge_id,
            code: ChallengeCode::new(code),
        }),
        _ => None,
    }
}
