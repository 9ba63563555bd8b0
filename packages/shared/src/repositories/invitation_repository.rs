use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::invitation::Invitation;
use crate::repositories::errors::invitation_repository_errors::InvitationRepositoryError;
use crate::repositories::invitation_path;
use crate::store::{Store, TxDecision, TxOutcome};

pub type InvitationTxFn<'a> = Box<dyn FnMut(Invitation) -> Option<Invitation> + Send + 'a>;

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create(&self, invitation: &Invitation)
        -> Result<(), InvitationRepositoryError>;

    async fn get(
        &self,
        invitation_id: &str,
    ) -> Result<Option<Invitation>, InvitationRepositoryError>;

    /// Atomic read-modify-write; the function returns the next invitation
    /// or None for a no-op. `NotFound` when absent.
    async fn mutate<'a>(
        &'a self,
        invitation_id: &'a str,
        f: InvitationTxFn<'a>,
    ) -> Result<TxOutcome, InvitationRepositoryError>;

    fn now(&self) -> i64;
}

pub struct StoreInvitationRepository {
    store: Arc<dyn Store>,
}

impl StoreInvitationRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StoreInvitationRepository { store }
    }
}

fn decode(value: Value) -> Result<Invitation, InvitationRepositoryError> {
    serde_json::from_value(value)
        .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl InvitationRepository for StoreInvitationRepository {
    async fn create(&self, invitation: &Invitation) -> Result<(), InvitationRepositoryError> {
        let path = invitation_path(&invitation.invitation_id);
        let encoded = serde_json::to_value(invitation)
            .map_err(|e| InvitationRepositoryError::Serialization(e.to_string()))?;

        let outcome = self
            .store
            .transact(
                &path,
                Box::new(|current| {
                    if current.is_some() {
                        TxDecision::Abort
                    } else {
                        TxDecision::Commit(encoded.clone())
                    }
                }),
            )
            .await?;

        match outcome {
            TxOutcome::Committed => Ok(()),
            TxOutcome::Aborted => Err(InvitationRepositoryError::AlreadyExists),
        }
    }

    async fn get(
        &self,
        invitation_id: &str,
    ) -> Result<Option<Invitation>, InvitationRepositoryError> {
        match self.store.get(&invitation_path(invitation_id)).await? {
            None => Ok(None),
            Some(value) => Ok(Some(decode(value)?)),
        }
    }

    async fn mutate<'a>(
        &'a self,
        invitation_id: &'a str,
        mut f: InvitationTxFn<'a>,
    ) -> Result<TxOutcome, InvitationRepositoryError> {
        let path = invitation_path(invitation_id);
        let mut error: Option<InvitationRepositoryError> = None;

        let outcome = self
            .store
            .transact(
                &path,
                Box::new(|current| {
                    error = None;
                    let invitation = match current {
                        None => {
                            error = Some(InvitationRepositoryError::NotFound);
                            return TxDecision::Abort;
                        }
                        Some(value) => match decode(value) {
                            Ok(invitation) => invitation,
                            Err(e) => {
                                error = Some(e);
                                return TxDecision::Abort;
                            }
                        },
                    };
                    match f(invitation) {
                        None => TxDecision::Abort,
                        Some(next) => match serde_json::to_value(&next) {
                            Ok(encoded) => TxDecision::Commit(encoded),
                            Err(e) => {
                                error = Some(InvitationRepositoryError::Serialization(
                                    e.to_string(),
                                ));
                                TxDecision::Abort
                            }
                        },
                    }
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        Ok(outcome)
    }

    fn now(&self) -> i64 {
        self.store.server_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invitation::InvitationStatus;
    use crate::store::MemoryStore;

    fn repo() -> StoreInvitationRepository {
        StoreInvitationRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_get_round_trip_and_no_clobber() {
        let repo = repo();
        let invitation = Invitation::new("a", "a_name", "b", "room", "medium", 5, 1_000);
        repo.create(&invitation).await.unwrap();

        let loaded = repo
            .get(&invitation.invitation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, invitation);

        assert!(matches!(
            repo.create(&invitation).await,
            Err(InvitationRepositoryError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn mutate_updates_status() {
        let repo = repo();
        let invitation = Invitation::new("a", "a_name", "b", "room", "medium", 5, 1_000);
        repo.create(&invitation).await.unwrap();

        repo.mutate(
            &invitation.invitation_id,
            Box::new(|mut inv| {
                inv.status = InvitationStatus::Declined;
                Some(inv)
            }),
        )
        .await
        .unwrap();

        let loaded = repo
            .get(&invitation.invitation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, InvitationStatus::Declined);
    }

    #[tokio::test]
    async fn mutate_missing_invitation_is_not_found() {
        let repo = repo();
        let outcome = repo.mutate("missing", Box::new(Some)).await;
        assert!(matches!(
            outcome,
            Err(InvitationRepositoryError::NotFound)
        ));
    }
}
