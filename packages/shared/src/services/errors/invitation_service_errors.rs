use crate::repositories::errors::invitation_repository_errors::InvitationRepositoryError;
use crate::services::errors::matchmaking_service_errors::MatchmakingServiceError;

#[derive(Debug)]
pub enum InvitationServiceError {
    NotFound,
    /// Past its five-minute deadline; treated like NotFound by callers.
    Expired,
    /// Only the invited user may accept or decline.
    NotInvitee,
    /// Only the sender may cancel.
    NotSender,
    /// The invitation is already accepted/declined/cancelled.
    AlreadySettled,
    /// The room operation behind the invitation failed (creating the room
    /// on send, joining it on accept).
    Join(MatchmakingServiceError),
    Conflict,
    Transient(String),
}

impl std::fmt::Display for InvitationServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationServiceError::NotFound => write!(f, "Invitation not found"),
            InvitationServiceError::Expired => write!(f, "Invitation has expired"),
            InvitationServiceError::NotInvitee => {
                write!(f, "Only the invited user may respond")
            }
            InvitationServiceError::NotSender => {
                write!(f, "Only the sender may cancel")
            }
            InvitationServiceError::AlreadySettled => {
                write!(f, "Invitation is already settled")
            }
            InvitationServiceError::Join(e) => write!(f, "Failed to join room: {}", e),
            InvitationServiceError::Conflict => {
                write!(f, "Lost a concurrent update race, try again")
            }
            InvitationServiceError::Transient(msg) => {
                write!(f, "Transient store error: {}", msg)
            }
        }
    }
}

impl std::error::Error for InvitationServiceError {}

impl From<InvitationRepositoryError> for InvitationServiceError {
    fn from(error: InvitationRepositoryError) -> Self {
        match error {
            InvitationRepositoryError::NotFound => InvitationServiceError::NotFound,
            InvitationRepositoryError::Conflict => InvitationServiceError::Conflict,
            other => InvitationServiceError::Transient(other.to_string()),
        }
    }
}
