use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::models::queue::{MatchTicket, QueueEntry, QueueState};
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use crate::repositories::QUEUE_PATH;
use crate::store::{Store, TxDecision};

/// Result of a queue poll for one user.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// A pairing deposited a ticket; the room id is inside.
    Ticket(String),
    /// The entry is still live; keep polling.
    Queued,
    /// No entry and no ticket: never enqueued, or expired and pruned.
    Absent,
}

#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Prunes expired entries/tickets, inserts (or refreshes) the caller's
    /// entry, and returns the post-commit state for candidate scanning.
    async fn upsert_entry(&self, entry: &QueueEntry)
        -> Result<QueueState, QueueRepositoryError>;

    /// Atomically removes both entries and deposits a ticket for each
    /// player, iff both are still present, unexpired and compatible.
    /// Returns false (nothing committed) when the precondition no longer
    /// holds. A pairer that already knows the room claims its own ticket
    /// right away; the other side finds it on the next poll.
    async fn pair(
        &self,
        caller_id: &str,
        partner_id: &str,
        room_id: &str,
    ) -> Result<bool, QueueRepositoryError>;

    /// Prunes, then claims the user's ticket or reports queue membership.
    /// A claimed ticket is removed in the same transaction.
    async fn claim(&self, user_id: &str) -> Result<ClaimOutcome, QueueRepositoryError>;

    /// Removes the user's entry and any unclaimed ticket.
    async fn remove_user(&self, user_id: &str) -> Result<(), QueueRepositoryError>;

    /// Read-only snapshot with expired entries and tickets filtered out.
    async fn state(&self) -> Result<QueueState, QueueRepositoryError>;

    fn now(&self) -> i64;
}

pub struct StoreQueueRepository {
    store: Arc<dyn Store>,
}

impl StoreQueueRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StoreQueueRepository { store }
    }
}

fn parse_state(value: Option<Value>) -> Result<QueueState, QueueRepositoryError> {
    match value {
        None => Ok(QueueState::default()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| QueueRepositoryError::Serialization(e.to_string())),
    }
}

fn encode_state(state: &QueueState) -> Result<Value, QueueRepositoryError> {
    if state.is_empty() {
        // An empty queue node reads the same as an absent one.
        return Ok(Value::Null);
    }
    serde_json::to_value(state).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl QueueRepository for StoreQueueRepository {
    async fn upsert_entry(
        &self,
        entry: &QueueEntry,
    ) -> Result<QueueState, QueueRepositoryError> {
        let now = self.store.server_now();
        let mut error: Option<QueueRepositoryError> = None;
        let mut committed: Option<QueueState> = None;

        self.store
            .transact(
                QUEUE_PATH,
                Box::new(|current| {
                    error = None;
                    committed = None;
                    let mut state = match parse_state(current) {
                        Ok(state) => state,
                        Err(e) => {
                            error = Some(e);
                            return TxDecision::Abort;
                        }
                    };
                    state.prune_expired(now);
                    state
                        .entries
                        .insert(entry.user_id.clone(), entry.clone());
                    let next = match encode_state(&state) {
                        Ok(next) => next,
                        Err(e) => {
                            error = Some(e);
                            return TxDecision::Abort;
                        }
                    };
                    committed = Some(state);
                    TxDecision::Commit(next)
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        debug!(user_id = %entry.user_id, "queue entry upserted");
        committed.ok_or(QueueRepositoryError::Conflict)
    }

    async fn pair(
        &self,
        caller_id: &str,
        partner_id: &str,
        room_id: &str,
    ) -> Result<bool, QueueRepositoryError> {
        let now = self.store.server_now();
        let mut error: Option<QueueRepositoryError> = None;
        let mut paired = false;

        self.store
            .transact(
                QUEUE_PATH,
                Box::new(|current| {
                    error = None;
                    paired = false;
                    let mut state = match parse_state(current) {
                        Ok(state) => state,
                        Err(e) => {
                            error = Some(e);
                            return TxDecision::Abort;
                        }
                    };
                    state.prune_expired(now);

                    let compatible = match (
                        state.entries.get(caller_id),
                        state.entries.get(partner_id),
                    ) {
                        (Some(caller), Some(partner)) => caller.is_compatible_with(partner),
                        _ => false,
                    };
                    if !compatible {
                        return TxDecision::Abort;
                    }

                    state.entries.remove(caller_id);
                    state.entries.remove(partner_id);
                    for user_id in [caller_id, partner_id] {
                        state.tickets.insert(
                            user_id.to_string(),
                            MatchTicket {
                                room_id: room_id.to_string(),
                                issued_at: now,
                            },
                        );
                    }
                    let next = match encode_state(&state) {
                        Ok(next) => next,
                        Err(e) => {
                            error = Some(e);
                            return TxDecision::Abort;
                        }
                    };
                    paired = true;
                    TxDecision::Commit(next)
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        Ok(paired)
    }

    async fn claim(&self, user_id: &str) -> Result<ClaimOutcome, QueueRepositoryError> {
        let now = self.store.server_now();
        let mut error: Option<QueueRepositoryError> = None;
        let mut outcome = ClaimOutcome::Absent;

        self.store
            .transact(
                QUEUE_PATH,
                Box::new(|current| {
                    error = None;
                    let mut state = match parse_state(current) {
                        Ok(state) => state,
                        Err(e) => {
                            error = Some(e);
                            return TxDecision::Abort;
                        }
                    };
                    state.prune_expired(now);

                    if let Some(ticket) = state.tickets.remove(user_id) {
                        outcome = ClaimOutcome::Ticket(ticket.room_id);
                    } else if state.entries.contains_key(user_id) {
                        outcome = ClaimOutcome::Queued;
                        return TxDecision::Abort;
                    } else {
                        outcome = ClaimOutcome::Absent;
                        return TxDecision::Abort;
                    }

                    match encode_state(&state) {
                        Ok(next) => TxDecision::Commit(next),
                        Err(e) => {
                            error = Some(e);
                            TxDecision::Abort
                        }
                    }
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        Ok(outcome)
    }

    async fn remove_user(&self, user_id: &str) -> Result<(), QueueRepositoryError> {
        let now = self.store.server_now();
        let mut error: Option<QueueRepositoryError> = None;

        self.store
            .transact(
                QUEUE_PATH,
                Box::new(|current| {
                    error = None;
                    let mut state = match parse_state(current) {
                        Ok(state) => state,
                        Err(e) => {
                            error = Some(e);
                            return TxDecision::Abort;
                        }
                    };
                    state.prune_expired(now);
                    state.entries.remove(user_id);
                    state.tickets.remove(user_id);
                    match encode_state(&state) {
                        Ok(next) => TxDecision::Commit(next),
                        Err(e) => {
                            error = Some(e);
                            TxDecision::Abort
                        }
                    }
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        Ok(())
    }

    async fn state(&self) -> Result<QueueState, QueueRepositoryError> {
        let now = self.store.server_now();
        let mut state = parse_state(self.store.get(QUEUE_PATH).await?)?;
        state.prune_expired(now);
        Ok(state)
    }

    fn now(&self) -> i64 {
        self.store.server_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QUEUE_ENTRY_TTL_MS;
    use crate::store::MemoryStore;

    fn entry(user_id: &str, now: i64) -> QueueEntry {
        QueueEntry {
            user_id: user_id.to_string(),
            username: format!("{}_name", user_id),
            display_name: user_id.to_uppercase(),
            rating: 1000,
            difficulty: "medium".to_string(),
            question_count: 5,
            enqueued_at: now,
        }
    }

    fn repo() -> (Arc<MemoryStore>, StoreQueueRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = StoreQueueRepository::new(store.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn upsert_then_state_round_trips() {
        let (_store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();

        let state = repo.state().await.unwrap();
        assert_eq!(state.entries.len(), 1);
        assert!(state.entries.contains_key("a"));
    }

    #[tokio::test]
    async fn pair_removes_both_and_leaves_a_ticket_each() {
        let (_store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();
        repo.upsert_entry(&entry("b", now)).await.unwrap();

        assert!(repo.pair("a", "b", "room-1").await.unwrap());

        let state = repo.state().await.unwrap();
        assert!(state.entries.is_empty());
        assert_eq!(state.tickets.get("a").unwrap().room_id, "room-1");
        assert_eq!(state.tickets.get("b").unwrap().room_id, "room-1");

        // Second attempt finds no entries and commits nothing.
        assert!(!repo.pair("a", "b", "room-2").await.unwrap());
        let state = repo.state().await.unwrap();
        assert_eq!(state.tickets.get("b").unwrap().room_id, "room-1");
    }

    #[tokio::test]
    async fn claim_consumes_ticket_once() {
        let (_store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();
        repo.upsert_entry(&entry("b", now)).await.unwrap();
        repo.pair("a", "b", "room-1").await.unwrap();

        assert_eq!(
            repo.claim("b").await.unwrap(),
            ClaimOutcome::Ticket("room-1".to_string())
        );
        assert_eq!(repo.claim("b").await.unwrap(), ClaimOutcome::Absent);
    }

    #[tokio::test]
    async fn claim_reports_live_entry_as_queued() {
        let (_store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();
        assert_eq!(repo.claim("a").await.unwrap(), ClaimOutcome::Queued);
    }

    #[tokio::test]
    async fn expired_entry_is_pruned_and_reads_absent() {
        let (store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();

        store.advance_clock(QUEUE_ENTRY_TTL_MS + 1_000);
        assert_eq!(repo.claim("a").await.unwrap(), ClaimOutcome::Absent);
        assert!(repo.state().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pair_refuses_expired_candidate() {
        let (store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();

        store.advance_clock(QUEUE_ENTRY_TTL_MS + 1_000);
        let late = repo.now();
        repo.upsert_entry(&entry("b", late)).await.unwrap();

        assert!(!repo.pair("b", "a", "room-1").await.unwrap());
    }

    #[tokio::test]
    async fn remove_user_drops_entry_and_ticket() {
        let (_store, repo) = repo();
        let now = repo.now();
        repo.upsert_entry(&entry("a", now)).await.unwrap();
        repo.upsert_entry(&entry("b", now)).await.unwrap();
        repo.pair("a", "b", "room-1").await.unwrap();

        repo.remove_user("b").await.unwrap();
        let state = repo.state().await.unwrap();
        assert!(!state.tickets.contains_key("b"));

        repo.remove_user("a").await.unwrap();
        assert!(repo.state().await.unwrap().is_empty());
    }
}
