use std::sync::Arc;

use tracing::info;

use crate::models::invitation::{Invitation, InvitationStatus};
use crate::models::room::Room;
use crate::repositories::invitation_repository::InvitationRepository;
use crate::services::errors::invitation_service_errors::InvitationServiceError;
use crate::services::matchmaking_service::MatchmakingService;

/// Direct friend-match invitations. Sending one creates the room up front;
/// accepting joins it through the same path a short-code join takes, so one
/// invitation seats at most one opponent.
pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    matchmaking: Arc<MatchmakingService>,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        matchmaking: Arc<MatchmakingService>,
    ) -> Self {
        InvitationService {
            invitations,
            matchmaking,
        }
    }

    /// Creates the room and a pending invitation pointing at it.
    pub async fn invite(
        &self,
        from_user_id: &str,
        from_username: &str,
        from_display_name: &str,
        to_user_id: &str,
        difficulty: &str,
        question_count: usize,
    ) -> Result<Invitation, InvitationServiceError> {
        let room = self
            .matchmaking
            .create_room(
                from_user_id,
                from_username,
                from_display_name,
                difficulty,
                question_count,
            )
            .await
            .map_err(InvitationServiceError::Join)?;

        let invitation = Invitation::new(
            from_user_id,
            from_username,
            to_user_id,
            &room.room_id,
            difficulty,
            question_count,
            self.invitations.now(),
        );
        self.invitations.create(&invitation).await?;
        info!(
            invitation_id = %invitation.invitation_id,
            from = from_user_id,
            to = to_user_id,
            room_id = %room.room_id,
            "invitation sent"
        );
        Ok(invitation)
    }

    /// The invitation as a caller should see it: a pending one past its
    /// deadline reads Expired.
    pub async fn get(&self, invitation_id: &str) -> Result<Invitation, InvitationServiceError> {
        let mut invitation = self
            .invitations
            .get(invitation_id)
            .await?
            .ok_or(InvitationServiceError::NotFound)?;
        invitation.status = invitation.effective_status(self.invitations.now());
        Ok(invitation)
    }

    /// Invitee-only. Marks the invitation accepted and seats the invitee in
    /// the referenced room. An expired invitation is marked as such and
    /// rejected.
    pub async fn accept(
        &self,
        invitation_id: &str,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<Room, InvitationServiceError> {
        let room_id = self
            .settle(invitation_id, user_id, Settlement::Accept)
            .await?;
        let room = self
            .matchmaking
            .join_room(&room_id, user_id, username, display_name)
            .await
            .map_err(InvitationServiceError::Join)?;
        info!(invitation_id, user_id, room_id = %room.room_id, "invitation accepted");
        Ok(room)
    }

    /// Invitee-only.
    pub async fn decline(
        &self,
        invitation_id: &str,
        user_id: &str,
    ) -> Result<(), InvitationServiceError> {
        self.settle(invitation_id, user_id, Settlement::Decline)
            .await?;
        info!(invitation_id, user_id, "invitation declined");
        Ok(())
    }

    /// Sender-only withdrawal of a still-pending invitation.
    pub async fn cancel(
        &self,
        invitation_id: &str,
        user_id: &str,
    ) -> Result<(), InvitationServiceError> {
        self.settle(invitation_id, user_id, Settlement::Cancel)
            .await?;
        info!(invitation_id, user_id, "invitation cancelled");
        Ok(())
    }

    /// One settlement transaction. Returns the referenced room id; an
    /// expiry discovered here is also written back so later readers see a
    /// stable status.
    async fn settle(
        &self,
        invitation_id: &str,
        user_id: &str,
        settlement: Settlement,
    ) -> Result<String, InvitationServiceError> {
        let now = self.invitations.now();
        let mut error: Option<InvitationServiceError> = None;
        let mut room_id: Option<String> = None;

        self.invitations
            .mutate(
                invitation_id,
                Box::new(|mut invitation| {
                    error = None;
                    room_id = None;

                    let authorized = match settlement {
                        Settlement::Accept | Settlement::Decline => {
                            invitation.to_user_id == user_id
                        }
                        Settlement::Cancel => invitation.from_user_id == user_id,
                    };
                    if !authorized {
                        error = Some(match settlement {
                            Settlement::Cancel => InvitationServiceError::NotSender,
                            _ => InvitationServiceError::NotInvitee,
                        });
                        return None;
                    }

                    match invitation.effective_status(now) {
                        InvitationStatus::Pending => {
                            invitation.status = match settlement {
                                Settlement::Accept => InvitationStatus::Accepted,
                                Settlement::Decline => InvitationStatus::Declined,
                                Settlement::Cancel => InvitationStatus::Cancelled,
                            };
                            room_id = Some(invitation.room_id.clone());
                            Some(invitation)
                        }
                        InvitationStatus::Expired => {
                            error = Some(InvitationServiceError::Expired);
                            if invitation.status == InvitationStatus::Pending {
                                invitation.status = InvitationStatus::Expired;
                                Some(invitation)
                            } else {
                                None
                            }
                        }
                        _ => {
                            error = Some(InvitationServiceError::AlreadySettled);
                            None
                        }
                    }
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        room_id.ok_or(InvitationServiceError::Conflict)
    }
}

#[derive(Clone, Copy)]
enum Settlement {
    Accept,
    Decline,
    Cancel,
}
