use crate::questions::QuestionProviderError;
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;

#[derive(Debug)]
pub enum MatchmakingServiceError {
    /// No room for the given id or short code.
    RoomNotFound,
    /// The room already seats two players.
    RoomFull,
    /// The room exists but is past WAITING.
    RoomNotJoinable,
    /// Could not claim a unique short code within the attempt bound.
    ShortCodeExhausted,
    /// The external provider returned an unusable question set.
    QuestionProvider(String),
    /// An optimistic transaction lost its race past the retry bound.
    Conflict,
    /// Store unreachable; nothing was committed, the caller may retry.
    Transient(String),
}

impl std::fmt::Display for MatchmakingServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchmakingServiceError::RoomNotFound => write!(f, "Room not found"),
            MatchmakingServiceError::RoomFull => write!(f, "Room is full"),
            MatchmakingServiceError::RoomNotJoinable => {
                write!(f, "Room is no longer joinable")
            }
            MatchmakingServiceError::ShortCodeExhausted => {
                write!(f, "Could not allocate a unique short code")
            }
            MatchmakingServiceError::QuestionProvider(msg) => {
                write!(f, "Question provider error: {}", msg)
            }
            MatchmakingServiceError::Conflict => {
                write!(f, "Lost a concurrent update race, try again")
            }
            MatchmakingServiceError::Transient(msg) => {
                write!(f, "Transient store error: {}", msg)
            }
        }
    }
}

impl std::error::Error for MatchmakingServiceError {}

impl From<QueueRepositoryError> for MatchmakingServiceError {
    fn from(error: QueueRepositoryError) -> Self {
        match error {
            QueueRepositoryError::Conflict => MatchmakingServiceError::Conflict,
            other => MatchmakingServiceError::Transient(other.to_string()),
        }
    }
}

impl From<RoomRepositoryError> for MatchmakingServiceError {
    fn from(error: RoomRepositoryError) -> Self {
        match error {
            RoomRepositoryError::NotFound => MatchmakingServiceError::RoomNotFound,
            RoomRepositoryError::Conflict => MatchmakingServiceError::Conflict,
            other => MatchmakingServiceError::Transient(other.to_string()),
        }
    }
}

impl From<QuestionProviderError> for MatchmakingServiceError {
    fn from(error: QuestionProviderError) -> Self {
        MatchmakingServiceError::QuestionProvider(error.to_string())
    }
}
