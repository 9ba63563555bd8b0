use std::sync::Arc;

use tracing::{debug, info};

use crate::config::MAX_TX_RETRIES;
use crate::models::match_result::MatchResult;
use crate::models::user_stats::UserStats;
use crate::repositories::errors::stats_repository_errors::StatsRepositoryError;
use crate::repositories::stats_repository::StatsRepository;
use crate::services::errors::stats_service_errors::StatsServiceError;

/// Reads and maintains per-user aggregates and the match history archive.
///
/// Applying a result is idempotent: each user's stats carry the ids of
/// every result already folded in, and a re-application of any of them is
/// a no-op, even after later results have been applied.
pub struct StatsService {
    repository: Arc<dyn StatsRepository>,
}

impl StatsService {
    pub fn new(repository: Arc<dyn StatsRepository>) -> Self {
        StatsService { repository }
    }

    /// A user's aggregate, defaulted for users who have never played.
    pub async fn user_stats(&self, user_id: &str) -> Result<UserStats, StatsServiceError> {
        match self.repository.get(user_id).await? {
            Some(stats) => Ok(stats),
            None => Ok(UserStats::new(user_id, user_id, self.repository.now())),
        }
    }

    /// The user's most recent results, newest first.
    pub async fn match_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchResult>, StatsServiceError> {
        let mut history: Vec<MatchResult> = self
            .repository
            .results()
            .await?
            .into_iter()
            .filter(|r| r.involves(user_id))
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(limit);
        Ok(history)
    }

    pub async fn get_result(
        &self,
        result_id: &str,
    ) -> Result<Option<MatchResult>, StatsServiceError> {
        Ok(self.repository.get_result(result_id).await?)
    }

    /// Archives a finished match. Ok when the result was already written by
    /// an earlier attempt.
    pub async fn record_result(&self, result: &MatchResult) -> Result<(), StatsServiceError> {
        if self.repository.insert_result(result).await? {
            info!(result_id = %result.result_id, room_id = %result.room_id, "match result recorded");
        } else {
            debug!(result_id = %result.result_id, "match result already recorded");
        }
        Ok(())
    }

    /// Folds a result into both players' aggregates. Safe to call again for
    /// the same result id.
    pub async fn apply_result(&self, result: &MatchResult) -> Result<(), StatsServiceError> {
        for player in result.players.values() {
            let mut attempts = 0;
            loop {
                let user_id = player.user_id.clone();
                let username = player.username.clone();
                let result_id = result.result_id.clone();
                let winner_id = result.winner_id.clone();
                let is_draw = result.is_draw;
                let score = player.score;
                let accuracy = player.accuracy;
                let rating_delta = player.rating_delta;
                let now = self.repository.now();

                let applied = self
                    .repository
                    .apply(
                        &player.user_id,
                        Box::new(move |current| {
                            let mut stats = current
                                .unwrap_or_else(|| UserStats::new(&user_id, &username, now));
                            if stats.has_applied(&result_id) {
                                return None;
                            }
                            stats.username = username.clone();
                            stats.total_matches += 1;
                            if is_draw {
                                stats.draws += 1;
                                stats.current_streak = 0;
                            } else if winner_id.as_deref() == Some(user_id.as_str()) {
                                stats.wins += 1;
                                stats.current_streak += 1;
                                stats.best_streak =
                                    stats.best_streak.max(stats.current_streak);
                            } else {
                                stats.losses += 1;
                                stats.current_streak = 0;
                            }
                            stats.rating = (stats.rating + rating_delta).max(0);
                            stats.total_score += score as i64;
                            let n = stats.total_matches as f64;
                            stats.average_accuracy =
                                (stats.average_accuracy * (n - 1.0) + accuracy) / n;
                            stats.applied_result_ids.push(result_id.clone());
                            stats.last_played_at = now;
                            Some(stats)
                        }),
                    )
                    .await;

                match applied {
                    Ok(_) => break,
                    Err(StatsRepositoryError::Conflict) if attempts < MAX_TX_RETRIES => {
                        attempts += 1;
                        debug!(user_id = %player.user_id, attempts, "stats apply conflict, retrying");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}
