use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::services::errors::stats_service_errors::StatsServiceError;

#[derive(Debug)]
pub enum RoomServiceError {
    RoomNotFound,
    PlayerNotInRoom,
    /// The requested mutation is not legal from the room's current state
    /// (for example writing to a FINISHED room). Rejected, never ignored.
    InvalidTransition(String),
    /// Answer submitted for a question that is not current.
    InvalidQuestionIndex,
    /// The player already has an answer for this question index.
    AlreadyAnswered,
    /// Lost the optimistic race past the retry bound; the caller may retry.
    Conflict,
    Transient(String),
    /// The room finished but recording result/stats failed.
    Stats(String),
}

impl std::fmt::Display for RoomServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomServiceError::RoomNotFound => write!(f, "Room not found"),
            RoomServiceError::PlayerNotInRoom => write!(f, "Player is not in this room"),
            RoomServiceError::InvalidTransition(msg) => {
                write!(f, "Invalid transition: {}", msg)
            }
            RoomServiceError::InvalidQuestionIndex => {
                write!(f, "Answer does not target the current question")
            }
            RoomServiceError::AlreadyAnswered => {
                write!(f, "Question already answered by this player")
            }
            RoomServiceError::Conflict => {
                write!(f, "Lost a concurrent update race, try again")
            }
            RoomServiceError::Transient(msg) => {
                write!(f, "Transient store error: {}", msg)
            }
            RoomServiceError::Stats(msg) => {
                write!(f, "Failed to record match outcome: {}", msg)
            }
        }
    }
}

impl std::error::Error for RoomServiceError {}

impl From<RoomRepositoryError> for RoomServiceError {
    fn from(error: RoomRepositoryError) -> Self {
        match error {
            RoomRepositoryError::NotFound => RoomServiceError::RoomNotFound,
            RoomRepositoryError::Conflict => RoomServiceError::Conflict,
            other => RoomServiceError::Transient(other.to_string()),
        }
    }
}

impl From<StatsServiceError> for RoomServiceError {
    fn from(error: StatsServiceError) -> Self {
        RoomServiceError::Stats(error.to_string())
    }
}
