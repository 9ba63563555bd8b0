use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{COUNTDOWN_MS, QUESTION_WINDOW_MS};

/// Lifecycle of a duel room. FINISHED and CANCELLED are terminal: the room
/// is retained for history but accepts no further writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Starting,
    InProgress,
    Finished,
    Cancelled,
}

impl RoomStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RoomStatus::Finished | RoomStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomMode {
    QuickMatch,
    FriendMatch,
    Tournament,
}

/// Question content arrives pre-validated from an external provider. Option
/// order is fixed at generation and identical for both players, so answers
/// can be compared by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub image_ref: String,
}

/// One submitted answer. `is_correct` is always recomputed from the frozen
/// question's correct text, never taken from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_index: usize,
    pub selected_answer: String,
    pub is_correct: bool,
    pub time_spent_ms: i64,
    pub submitted_at: i64,
}

/// A player embedded in a room, keyed by user id.
///
/// `answers` is an append-only ordered list keyed implicitly by question
/// index, never a sparse map, to keep the store schema unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub score: i32,
    pub correct_answers: u32,
    pub answers: Vec<Answer>,
    pub is_ready: bool,
    pub is_online: bool,
    pub last_seen: i64,
}

impl Player {
    pub fn new(user_id: &str, username: &str, display_name: &str, now: i64) -> Self {
        Player {
            user_id: user_id.to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            score: 0,
            correct_answers: 0,
            answers: Vec::new(),
            is_ready: true,
            is_online: true,
            last_seen: now,
        }
    }

    pub fn has_answered(&self, question_index: usize) -> bool {
        self.answers
            .iter()
            .any(|a| a.question_index == question_index)
    }

    pub fn answer(&self, question_index: usize) -> Option<&Answer> {
        self.answers
            .iter()
            .find(|a| a.question_index == question_index)
    }
}

/// Full state of one two-player duel.
///
/// Timestamps are server-assigned epoch milliseconds; 0 means "not yet
/// stamped". `questions` is frozen once the room leaves WAITING.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub short_code: String,
    pub mode: RoomMode,
    pub difficulty: String,
    pub question_count: usize,
    pub status: RoomStatus,
    pub host_user_id: String,
    pub players: HashMap<String, Player>,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    /// Stamped on entering STARTING; the countdown deadline is derived
    /// from it.
    pub starting_at: i64,
    /// Stamped on entering IN_PROGRESS.
    pub start_time: i64,
    /// Restamped every time a question becomes current.
    pub question_started_at: i64,
    pub end_time: i64,
    /// Set exactly once by the transition that finishes the room; marks
    /// which MatchResult belongs to it.
    pub result_id: Option<String>,
    pub created_at: i64,
}

impl Room {
    pub fn new(
        host: Player,
        mode: RoomMode,
        difficulty: &str,
        questions: Vec<Question>,
        short_code: &str,
        now: i64,
    ) -> Self {
        let mut players = HashMap::new();
        players.insert(host.user_id.clone(), host.clone());
        Room {
            room_id: Uuid::new_v4().to_string(),
            short_code: short_code.to_string(),
            mode,
            difficulty: difficulty.to_string(),
            question_count: questions.len(),
            status: RoomStatus::Waiting,
            host_user_id: host.user_id,
            players,
            questions,
            current_question_index: 0,
            starting_at: 0,
            start_time: 0,
            question_started_at: 0,
            end_time: 0,
            result_id: None,
            created_at: now,
        }
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_user_id == user_id
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    pub fn can_start(&self) -> bool {
        self.status == RoomStatus::Waiting && self.players.len() >= 2
    }

    pub fn player(&self, user_id: &str) -> Option<&Player> {
        self.players.get(user_id)
    }

    pub fn opponent_of(&self, user_id: &str) -> Option<&Player> {
        self.players.values().find(|p| p.user_id != user_id)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Absolute deadline for the STARTING countdown.
    pub fn countdown_deadline(&self) -> i64 {
        self.starting_at + COUNTDOWN_MS
    }

    /// Absolute deadline for the current question's answer window.
    pub fn question_deadline(&self) -> i64 {
        self.question_started_at + QUESTION_WINDOW_MS
    }

    /// True when every seated player has an answer for the current question.
    pub fn all_answered_current(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .values()
                .all(|p| p.has_answered(self.current_question_index))
    }
}
