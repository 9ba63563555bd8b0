//! Score and rating math. Pure functions over frozen room data; the
//! server-trusted recompute path, never fed by client-submitted scores.

use std::collections::HashMap;

use crate::config::{ELO_K, ELO_MAX_DELTA, QUESTION_WINDOW_MS};
use crate::models::match_result::{MatchResult, PlayerResult};
use crate::models::room::Room;

/// Per-answer score: whole seconds remaining in the answer window at
/// submission, rewarding speed and correctness jointly. Zero when wrong or
/// when the window had already elapsed.
pub fn answer_score(is_correct: bool, time_spent_ms: i64) -> i32 {
    if !is_correct {
        return 0;
    }
    let remaining = QUESTION_WINDOW_MS - time_spent_ms;
    if remaining <= 0 {
        0
    } else {
        (remaining / 1_000) as i32
    }
}

/// Classic Elo expectation of the first player against the second.
pub fn expected_score(rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_rating - rating) as f64 / 400.0))
}

/// Bounded Elo delta for one player. `actual` is 1.0 win, 0.5 draw, 0.0
/// loss.
pub fn rating_delta(rating: i32, opponent_rating: i32, actual: f64) -> i32 {
    let raw = (ELO_K * (actual - expected_score(rating, opponent_rating))).round() as i32;
    raw.clamp(-ELO_MAX_DELTA, ELO_MAX_DELTA)
}

/// Assembles the immutable MatchResult for a room that just finished.
/// `ratings` holds both players' pre-match ratings.
pub fn build_match_result(
    room: &Room,
    result_id: &str,
    ratings: &HashMap<String, i32>,
    now: i64,
) -> MatchResult {
    let mut ranked: Vec<_> = room.players.values().collect();
    // Deterministic order: best score first, ties by user id.
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.user_id.cmp(&b.user_id)));

    let is_draw = ranked.len() == 2 && ranked[0].score == ranked[1].score;
    let winner_id = (!is_draw).then(|| ranked[0].user_id.clone());
    let loser_id = (!is_draw)
        .then(|| ranked.get(1).map(|p| p.user_id.clone()))
        .flatten();

    let players = ranked
        .iter()
        .enumerate()
        .map(|(index, player)| {
            let actual = if is_draw {
                0.5
            } else if index == 0 {
                1.0
            } else {
                0.0
            };
            let rating = ratings.get(&player.user_id).copied().unwrap_or_default();
            let opponent_rating = room
                .opponent_of(&player.user_id)
                .and_then(|o| ratings.get(&o.user_id).copied())
                .unwrap_or(rating);
            let total_time: i64 = player.answers.iter().map(|a| a.time_spent_ms).sum();
            let accuracy = if room.question_count > 0 {
                (player.correct_answers as f64 / room.question_count as f64) * 100.0
            } else {
                0.0
            };
            (
                player.user_id.clone(),
                PlayerResult {
                    user_id: player.user_id.clone(),
                    username: player.username.clone(),
                    score: player.score,
                    correct_answers: player.correct_answers,
                    total_questions: room.question_count,
                    accuracy,
                    average_time_per_question_ms: if room.question_count > 0 {
                        total_time / room.question_count as i64
                    } else {
                        0
                    },
                    rank: if is_draw { 1 } else { (index + 1) as u32 },
                    rating_delta: rating_delta(rating, opponent_rating, actual),
                },
            )
        })
        .collect();

    MatchResult {
        result_id: result_id.to_string(),
        room_id: room.room_id.clone(),
        winner_id,
        loser_id,
        is_draw,
        players,
        question_count: room.question_count,
        difficulty: room.difficulty.clone(),
        start_time: room.start_time,
        end_time: room.end_time,
        duration_ms: room.end_time - room.start_time,
        created_at: now,
    }
}
