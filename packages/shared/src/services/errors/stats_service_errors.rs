use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;

#[derive(Debug)]
pub enum StatsServiceError {
    Conflict,
    Transient(String),
}

impl std::fmt::Display for StatsServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsServiceError::Conflict => {
                write!(f, "Lost a concurrent update race, try again")
            }
            StatsServiceError::Transient(msg) => {
                write!(f, "Transient store error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StatsServiceError {}

impl From<StatsRepositoryError> for StatsServiceError {
    fn from(error: StatsRepositoryError) -> Self {
        match error {
            StatsRepositoryError::Conflict => StatsServiceError::Conflict,
            other => StatsServiceError::Transient(other.to_string()),
        }
    }
}
