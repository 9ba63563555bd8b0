use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::models::match_result::MatchResult;
use crate::models::user_stats::UserStats;
use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;
use crate::repositories::{result_path, stats_path, RESULTS_PATH};
use crate::store::{Store, TxDecision, TxOutcome};

pub type StatsTxFn<'a> = Box<dyn FnMut(Option<UserStats>) -> Option<UserStats> + Send + 'a>;

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserStats>, StatsRepositoryError>;

    /// Atomic read-modify-write on one user's stats. The function sees the
    /// current stats (None when absent) and returns the next value, or None
    /// to leave the node untouched.
    async fn apply<'a>(
        &'a self,
        user_id: &'a str,
        f: StatsTxFn<'a>,
    ) -> Result<TxOutcome, StatsRepositoryError>;

    /// Writes a MatchResult exactly once; false when the id already exists.
    async fn insert_result(&self, result: &MatchResult)
        -> Result<bool, StatsRepositoryError>;

    async fn get_result(
        &self,
        result_id: &str,
    ) -> Result<Option<MatchResult>, StatsRepositoryError>;

    /// Every stored result, unordered; callers filter and sort.
    async fn results(&self) -> Result<Vec<MatchResult>, StatsRepositoryError>;

    fn now(&self) -> i64;
}

pub struct StoreStatsRepository {
    store: Arc<dyn Store>,
}

impl StoreStatsRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StoreStatsRepository { store }
    }
}

#[async_trait]
impl StatsRepository for StoreStatsRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserStats>, StatsRepositoryError> {
        match self.store.get(&stats_path(user_id)).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StatsRepositoryError::Serialization(e.to_string())),
        }
    }

    async fn apply<'a>(
        &'a self,
        user_id: &'a str,
        mut f: StatsTxFn<'a>,
    ) -> Result<TxOutcome, StatsRepositoryError> {
        let path = stats_path(user_id);
        let mut error: Option<StatsRepositoryError> = None;

        let outcome = self
            .store
            .transact(
                &path,
                Box::new(|current| {
                    error = None;
                    let stats = match current {
                        None => None,
                        Some(value) => match serde_json::from_value::<UserStats>(value) {
                            Ok(stats) => Some(stats),
                            Err(e) => {
                                error = Some(StatsRepositoryError::Serialization(
                                    e.to_string(),
                                ));
                                return TxDecision::Abort;
                            }
                        },
                    };
                    match f(stats) {
                        None => TxDecision::Abort,
                        Some(next) => match serde_json::to_value(&next) {
                            Ok(encoded) => TxDecision::Commit(encoded),
                            Err(e) => {
                                error = Some(StatsRepositoryError::Serialization(
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

    async fn insert_result(
        &self,
        result: &MatchResult,
    ) -> Result<bool, StatsRepositoryError> {
        let path = result_path(&result.result_id);
        let encoded = serde_json::to_value(result)
            .map_err(|e| StatsRepositoryError::Serialization(e.to_string()))?;

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

        if outcome == TxOutcome::Committed {
            debug!(result_id = %result.result_id, room_id = %result.room_id, "match result stored");
        }
        Ok(outcome == TxOutcome::Committed)
    }

    async fn get_result(
        &self,
        result_id: &str,
    ) -> Result<Option<MatchResult>, StatsRepositoryError> {
        match self.store.get(&result_path(result_id)).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StatsRepositoryError::Serialization(e.to_string())),
        }
    }

    async fn results(&self) -> Result<Vec<MatchResult>, StatsRepositoryError> {
        let children = self.store.children(RESULTS_PATH).await?;
        children
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_value::<MatchResult>(value)
                    .map_err(|e| StatsRepositoryError::Serialization(e.to_string()))
            })
            .collect()
    }

    fn now(&self) -> i64 {
        self.store.server_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::store::MemoryStore;

    fn result(result_id: &str, room_id: &str, created_at: i64) -> MatchResult {
        MatchResult {
            result_id: result_id.to_string(),
            room_id: room_id.to_string(),
            winner_id: Some("a".into()),
            loser_id: Some("b".into()),
            is_draw: false,
            players: HashMap::new(),
            question_count: 3,
            difficulty: "medium".into(),
            start_time: 0,
            end_time: created_at,
            duration_ms: created_at,
            created_at,
        }
    }

    fn repo() -> StoreStatsRepository {
        StoreStatsRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn apply_creates_and_updates_stats() {
        let repo = repo();
        assert!(repo.get("u").await.unwrap().is_none());

        repo.apply(
            "u",
            Box::new(|current| {
                let mut stats =
                    current.unwrap_or_else(|| UserStats::new("u", "u_name", 1_000));
                stats.total_matches += 1;
                Some(stats)
            }),
        )
        .await
        .unwrap();

        let stats = repo.get("u").await.unwrap().unwrap();
        assert_eq!(stats.total_matches, 1);
        assert_eq!(stats.username, "u_name");
    }

    #[tokio::test]
    async fn apply_none_leaves_node_untouched() {
        let repo = repo();
        let outcome = repo.apply("u", Box::new(|_| None)).await.unwrap();
        assert_eq!(outcome, TxOutcome::Aborted);
        assert!(repo.get("u").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_result_is_exactly_once() {
        let repo = repo();
        let result = result("res-1", "room-1", 10);
        assert!(repo.insert_result(&result).await.unwrap());
        assert!(!repo.insert_result(&result).await.unwrap());

        let loaded = repo.get_result("res-1").await.unwrap().unwrap();
        assert_eq!(loaded, result);
    }

    #[tokio::test]
    async fn results_returns_all_stored() {
        let repo = repo();
        repo.insert_result(&result("res-1", "room-1", 10))
            .await
            .unwrap();
        repo.insert_result(&result("res-2", "room-2", 20))
            .await
            .unwrap();

        let all = repo.results().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
