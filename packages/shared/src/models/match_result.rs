use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Immutable post-match record, created exactly once by the FINISHED
/// transition and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub result_id: String,
    pub room_id: String,
    /// None on a draw.
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    pub is_draw: bool,
    pub players: HashMap<String, PlayerResult>,
    pub question_count: usize,
    pub difficulty: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: i64,
    pub created_at: i64,
}

impl MatchResult {
    pub fn involves(&self, user_id: &str) -> bool {
        self.players.contains_key(user_id)
    }

    pub fn result_for(&self, user_id: &str) -> Option<&PlayerResult> {
        self.players.get(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub user_id: String,
    pub username: String,
    pub score: i32,
    pub correct_answers: u32,
    pub total_questions: usize,
    /// Percentage of questions answered correctly.
    pub accuracy: f64,
    pub average_time_per_question_ms: i64,
    /// 1 for the winner (or both on a draw with equal score).
    pub rank: u32,
    pub rating_delta: i32,
}
