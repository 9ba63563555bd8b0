use crate::store::StoreError;

#[derive(Debug)]
pub enum InvitationRepositoryError {
    NotFound,
    AlreadyExists,
    Conflict,
    Serialization(String),
    Store(String),
}

impl std::fmt::Display for InvitationRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationRepositoryError::NotFound => write!(f, "Invitation not found"),
            InvitationRepositoryError::AlreadyExists => {
                write!(f, "Invitation already exists")
            }
            InvitationRepositoryError::Conflict => {
                write!(f, "Invitation transaction conflict")
            }
            InvitationRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            InvitationRepositoryError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for InvitationRepositoryError {}

impl From<StoreError> for InvitationRepositoryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => InvitationRepositoryError::Conflict,
            StoreError::Unavailable(msg) => InvitationRepositoryError::Store(msg),
            StoreError::Serialization(msg) => InvitationRepositoryError::Serialization(msg),
        }
    }
}
