use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_RATING;

/// Per-user aggregate, mutated only by the stats application that follows a
/// MatchResult. `username` is denormalized here at write time so history and
/// leaderboard reads never scan results for a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub username: String,
    pub total_matches: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub rating: i32,
    pub total_score: i64,
    /// Running average over matches, in percent.
    pub average_accuracy: f64,
    /// Ids of every result already folded in, so a repair pass replaying
    /// an old result cannot count it twice.
    #[serde(default)]
    pub applied_result_ids: Vec<String>,
    pub last_played_at: i64,
    pub created_at: i64,
}

impl UserStats {
    pub fn new(user_id: &str, username: &str, now: i64) -> Self {
        UserStats {
            user_id: user_id.to_string(),
            username: username.to_string(),
            total_matches: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            current_streak: 0,
            best_streak: 0,
            rating: DEFAULT_RATING,
            total_score: 0,
            average_accuracy: 0.0,
            applied_result_ids: Vec::new(),
            last_played_at: 0,
            created_at: now,
        }
    }

    pub fn has_applied(&self, result_id: &str) -> bool {
        self.applied_result_ids.iter().any(|id| id == result_id)
    }

    /// Rank tier derived from rating; computed on read, never stored.
    pub fn rank_title(&self) -> &'static str {
        match self.rating {
            r if r >= 2000 => "Diamond",
            r if r >= 1700 => "Platinum",
            r if r >= 1400 => "Gold",
            r if r >= 1100 => "Silver",
            r if r >= 800 => "Bronze",
            _ => "Beginner",
        }
    }

    pub fn win_rate_percent(&self) -> u32 {
        if self.total_matches == 0 {
            return 0;
        }
        ((self.wins as f64 / self.total_matches as f64) * 100.0) as u32
    }
}
