use crate::repositories::errors::room_repository_errors::RoomRepositoryError;

#[derive(Debug)]
pub enum RoomObserverError {
    /// The first snapshot was absent: no such room.
    RoomNotFound,
    Transient(String),
}

impl std::fmt::Display for RoomObserverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomObserverError::RoomNotFound => write!(f, "Room not found"),
            RoomObserverError::Transient(msg) => {
                write!(f, "Transient store error: {}", msg)
            }
        }
    }
}

impl std::error::Error for RoomObserverError {}

impl From<RoomRepositoryError> for RoomObserverError {
    fn from(error: RoomRepositoryError) -> Self {
        match error {
            RoomRepositoryError::NotFound => RoomObserverError::RoomNotFound,
            other => RoomObserverError::Transient(other.to_string()),
        }
    }
}
