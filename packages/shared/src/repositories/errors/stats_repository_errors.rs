use crate::store::StoreError;

#[derive(Debug)]
pub enum StatsRepositoryError {
    Conflict,
    Serialization(String),
    Store(String),
}

impl std::fmt::Display for StatsRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsRepositoryError::Conflict => write!(f, "Stats transaction conflict"),
            StatsRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            StatsRepositoryError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StatsRepositoryError {}

impl From<StoreError> for StatsRepositoryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => StatsRepositoryError::Conflict,
            StoreError::Unavailable(msg) => StatsRepositoryError::Store(msg),
            StoreError::Serialization(msg) => StatsRepositoryError::Serialization(msg),
        }
    }
}
