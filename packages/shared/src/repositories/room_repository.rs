use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

use crate::models::room::Room;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::{room_path, short_code_path, ROOMS_PATH};
use crate::store::{Store, TxDecision, TxOutcome};

/// Next state produced by a room transaction function.
pub enum RoomMutation {
    Update(Room),
    /// Remove the room node (used to roll back a room the pairing
    /// transaction failed to hand over).
    Delete,
    /// No-op; nothing is committed.
    Keep,
}

pub type RoomTxFn<'a> = Box<dyn FnMut(Room) -> RoomMutation + Send + 'a>;

/// Store access for rooms and their short join codes. All room mutation
/// funnels through `mutate`, whose function sees post-merge state; that
/// is the mechanical half of concurrent-write reconciliation.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Writes a new room; fails with `AlreadyExists` rather than clobbering.
    async fn create(&self, room: &Room) -> Result<(), RoomRepositoryError>;

    async fn get(&self, room_id: &str) -> Result<Option<Room>, RoomRepositoryError>;

    /// Atomic read-modify-write on one room. `NotFound` when absent.
    async fn mutate<'a>(
        &'a self,
        room_id: &'a str,
        f: RoomTxFn<'a>,
    ) -> Result<TxOutcome, RoomRepositoryError>;

    /// Claims `code` for `room_id`; false when the code is already taken.
    async fn reserve_code(&self, code: &str, room_id: &str)
        -> Result<bool, RoomRepositoryError>;

    async fn release_code(&self, code: &str) -> Result<(), RoomRepositoryError>;

    async fn resolve_code(&self, code: &str) -> Result<Option<String>, RoomRepositoryError>;

    /// Typed room stream: current state immediately, then every change.
    /// Undecodable nodes surface as `None`, the same as a deleted room.
    async fn subscribe(
        &self,
        room_id: &str,
    ) -> Result<UnboundedReceiver<Option<Room>>, RoomRepositoryError>;

    /// Ids of every stored room (active and terminal), for sweeps.
    async fn room_ids(&self) -> Result<Vec<String>, RoomRepositoryError>;

    fn now(&self) -> i64;
}

pub struct StoreRoomRepository {
    store: Arc<dyn Store>,
}

impl StoreRoomRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StoreRoomRepository { store }
    }
}

fn decode_room(value: Value) -> Result<Room, RoomRepositoryError> {
    serde_json::from_value(value).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))
}

fn encode_room(room: &Room) -> Result<Value, RoomRepositoryError> {
    serde_json::to_value(room).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl RoomRepository for StoreRoomRepository {
    async fn create(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        let path = room_path(&room.room_id);
        let encoded = encode_room(room)?;
        let mut exists = false;

        let outcome = self
            .store
            .transact(
                &path,
                Box::new(|current| {
                    exists = current.is_some();
                    if exists {
                        TxDecision::Abort
                    } else {
                        TxDecision::Commit(encoded.clone())
                    }
                }),
            )
            .await?;

        match outcome {
            TxOutcome::Committed => {
                debug!(room_id = %room.room_id, "room created");
                Ok(())
            }
            TxOutcome::Aborted => Err(RoomRepositoryError::AlreadyExists),
        }
    }

    async fn get(&self, room_id: &str) -> Result<Option<Room>, RoomRepositoryError> {
        match self.store.get(&room_path(room_id)).await? {
            None => Ok(None),
            Some(value) => Ok(Some(decode_room(value)?)),
        }
    }

    async fn mutate<'a>(
        &'a self,
        room_id: &'a str,
        mut f: RoomTxFn<'a>,
    ) -> Result<TxOutcome, RoomRepositoryError> {
        let path = room_path(room_id);
        let mut error: Option<RoomRepositoryError> = None;

        let outcome = self
            .store
            .transact(
                &path,
                Box::new(|current| {
                    error = None;
                    let room = match current {
                        None => {
                            error = Some(RoomRepositoryError::NotFound);
                            return TxDecision::Abort;
                        }
                        Some(value) => match decode_room(value) {
                            Ok(room) => room,
                            Err(e) => {
                                error = Some(e);
                                return TxDecision::Abort;
                            }
                        },
                    };
                    match f(room) {
                        RoomMutation::Update(next) => match encode_room(&next) {
                            Ok(encoded) => TxDecision::Commit(encoded),
                            Err(e) => {
                                error = Some(e);
                                TxDecision::Abort
                            }
                        },
                        RoomMutation::Delete => TxDecision::Commit(Value::Null),
                        RoomMutation::Keep => TxDecision::Abort,
                    }
                }),
            )
            .await?;

        if let Some(e) = error {
            return Err(e);
        }
        Ok(outcome)
    }

    async fn reserve_code(
        &self,
        code: &str,
        room_id: &str,
    ) -> Result<bool, RoomRepositoryError> {
        let path = short_code_path(code);
        let target = Value::String(room_id.to_string());

        let outcome = self
            .store
            .transact(
                &path,
                Box::new(|current| {
                    if current.is_some() {
                        TxDecision::Abort
                    } else {
                        TxDecision::Commit(target.clone())
                    }
                }),
            )
            .await?;

        Ok(outcome == TxOutcome::Committed)
    }

    async fn release_code(&self, code: &str) -> Result<(), RoomRepositoryError> {
        self.store
            .transact(
                &short_code_path(code),
                Box::new(|_| TxDecision::Commit(Value::Null)),
            )
            .await?;
        Ok(())
    }

    async fn resolve_code(&self, code: &str) -> Result<Option<String>, RoomRepositoryError> {
        match self.store.get(&short_code_path(code)).await? {
            Some(Value::String(room_id)) => Ok(Some(room_id)),
            Some(other) => Err(RoomRepositoryError::Serialization(format!(
                "short code maps to non-string value: {}",
                other
            ))),
            None => Ok(None),
        }
    }

    async fn subscribe(
        &self,
        room_id: &str,
    ) -> Result<UnboundedReceiver<Option<Room>>, RoomRepositoryError> {
        let mut source = self.store.subscribe(&room_path(room_id)).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let room_id = room_id.to_string();

        // Forward until the observer drops its receiver; that closes the
        // store-side subscription too, so nothing leaks past teardown.
        tokio::spawn(async move {
            while let Some(value) = source.recv().await {
                let room = match value {
                    None => None,
                    Some(v) => match serde_json::from_value::<Room>(v) {
                        Ok(room) => Some(room),
                        Err(e) => {
                            warn!(room_id = %room_id, error = %e, "undecodable room push");
                            None
                        }
                    },
                };
                if tx.send(room).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn room_ids(&self) -> Result<Vec<String>, RoomRepositoryError> {
        let children = self.store.children(ROOMS_PATH).await?;
        Ok(children.into_iter().map(|(id, _)| id).collect())
    }

    fn now(&self) -> i64 {
        self.store.server_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::room::{Player, Room, RoomMode, RoomStatus};
    use crate::questions::FixedQuestionProvider;
    use crate::questions::QuestionProvider;
    use crate::store::MemoryStore;

    async fn sample_room(now: i64) -> Room {
        let questions = FixedQuestionProvider::with_placeholder_pool(5)
            .questions("medium", 2)
            .await
            .unwrap();
        Room::new(
            Player::new("host", "host_name", "Host", now),
            RoomMode::FriendMatch,
            "medium",
            questions,
            "AB23CD",
            now,
        )
    }

    fn repo() -> (Arc<MemoryStore>, StoreRoomRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = StoreRoomRepository::new(store.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn create_get_round_trip() {
        let (_store, repo) = repo();
        let room = sample_room(repo.now()).await;
        repo.create(&room).await.unwrap();

        let loaded = repo.get(&room.room_id).await.unwrap().unwrap();
        assert_eq!(loaded, room);
        assert_eq!(repo.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_refuses_to_clobber() {
        let (_store, repo) = repo();
        let room = sample_room(repo.now()).await;
        repo.create(&room).await.unwrap();
        assert!(matches!(
            repo.create(&room).await,
            Err(RoomRepositoryError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn mutate_applies_update_and_reports_missing_room() {
        let (_store, repo) = repo();
        let room = sample_room(repo.now()).await;
        repo.create(&room).await.unwrap();

        let outcome = repo
            .mutate(
                &room.room_id,
                Box::new(|mut r| {
                    r.status = RoomStatus::Starting;
                    r.starting_at = 99;
                    RoomMutation::Update(r)
                }),
            )
            .await
            .unwrap();
        assert_eq!(outcome, TxOutcome::Committed);

        let loaded = repo.get(&room.room_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RoomStatus::Starting);
        assert_eq!(loaded.starting_at, 99);

        let missing = repo
            .mutate("missing", Box::new(RoomMutation::Update))
            .await;
        assert!(matches!(missing, Err(RoomRepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn mutate_keep_commits_nothing() {
        let (_store, repo) = repo();
        let room = sample_room(repo.now()).await;
        repo.create(&room).await.unwrap();

        let outcome = repo
            .mutate(&room.room_id, Box::new(|_| RoomMutation::Keep))
            .await
            .unwrap();
        assert_eq!(outcome, TxOutcome::Aborted);
        assert_eq!(repo.get(&room.room_id).await.unwrap().unwrap(), room);
    }

    #[tokio::test]
    async fn short_codes_reserve_once_and_resolve() {
        let (_store, repo) = repo();
        assert!(repo.reserve_code("AB23CD", "room-1").await.unwrap());
        assert!(!repo.reserve_code("AB23CD", "room-2").await.unwrap());
        assert_eq!(
            repo.resolve_code("AB23CD").await.unwrap(),
            Some("room-1".to_string())
        );

        repo.release_code("AB23CD").await.unwrap();
        assert_eq!(repo.resolve_code("AB23CD").await.unwrap(), None);
        assert!(repo.reserve_code("AB23CD", "room-2").await.unwrap());
    }

    #[tokio::test]
    async fn subscribe_streams_typed_rooms() {
        let (_store, repo) = repo();
        let room = sample_room(repo.now()).await;
        repo.create(&room).await.unwrap();

        let mut rx = repo.subscribe(&room.room_id).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), room);

        repo.mutate(
            &room.room_id,
            Box::new(|mut r| {
                r.current_question_index = 1;
                RoomMutation::Update(r)
            }),
        )
        .await
        .unwrap();

        let pushed = rx.recv().await.unwrap().unwrap();
        assert_eq!(pushed.current_question_index, 1);
    }

    #[tokio::test]
    async fn room_ids_lists_created_rooms() {
        let (_store, repo) = repo();
        let a = sample_room(repo.now()).await;
        let b = sample_room(repo.now()).await;
        repo.create(&a).await.unwrap();
        repo.create(&b).await.unwrap();

        let mut ids = repo.room_ids().await.unwrap();
        ids.sort();
        let mut expected = vec![a.room_id, b.room_id];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
