use crate::store::StoreError;

#[derive(Debug)]
pub enum QueueRepositoryError {
    Conflict,
    Serialization(String),
    Store(String),
}

impl std::fmt::Display for QueueRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueRepositoryError::Conflict => write!(f, "Queue transaction conflict"),
            QueueRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            QueueRepositoryError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for QueueRepositoryError {}

impl From<StoreError> for QueueRepositoryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => QueueRepositoryError::Conflict,
            StoreError::Unavailable(msg) => QueueRepositoryError::Store(msg),
            StoreError::Serialization(msg) => QueueRepositoryError::Serialization(msg),
        }
    }
}
