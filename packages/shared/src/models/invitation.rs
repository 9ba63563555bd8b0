use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::INVITATION_TTL_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

/// A friend-match invitation referencing an already created room. Expiry is
/// a derived property of `expires_at`, not an active timer; delivery of the
/// invitation is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_id: String,
    pub from_user_id: String,
    pub from_username: String,
    pub to_user_id: String,
    pub room_id: String,
    pub difficulty: String,
    pub question_count: usize,
    pub status: InvitationStatus,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Invitation {
    pub fn new(
        from_user_id: &str,
        from_username: &str,
        to_user_id: &str,
        room_id: &str,
        difficulty: &str,
        question_count: usize,
        now: i64,
    ) -> Self {
        Invitation {
            invitation_id: Uuid::new_v4().to_string(),
            from_user_id: from_user_id.to_string(),
            from_username: from_username.to_string(),
            to_user_id: to_user_id.to_string(),
            room_id: room_id.to_string(),
            difficulty: difficulty.to_string(),
            question_count,
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + INVITATION_TTL_MS,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Status as seen by a caller: a pending invitation past its deadline
    /// reads as expired even though nothing rewrote the stored field.
    pub fn effective_status(&self, now: i64) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }
}
