use crate::store::StoreError;

#[derive(Debug)]
pub enum RoomRepositoryError {
    NotFound,
    AlreadyExists,
    Conflict,
    Serialization(String),
    Store(String),
}

impl std::fmt::Display for RoomRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRepositoryError::NotFound => write!(f, "Room not found"),
            RoomRepositoryError::AlreadyExists => write!(f, "Room already exists"),
            RoomRepositoryError::Conflict => write!(f, "Room transaction conflict"),
            RoomRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            RoomRepositoryError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for RoomRepositoryError {}

impl From<StoreError> for RoomRepositoryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => RoomRepositoryError::Conflict,
            StoreError::Unavailable(msg) => RoomRepositoryError::Store(msg),
            StoreError::Serialization(msg) => RoomRepositoryError::Serialization(msg),
        }
    }
}
