use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::models::room::{Room, RoomStatus};
use crate::repositories::room_repository::RoomRepository;
use crate::services::errors::room_observer_errors::RoomObserverError;
use crate::services::turn_clock;

/// What a client renders between pushes: phase, progress and per-phase
/// countdowns, plus a per-player scoreboard. Derived entirely from the room
/// and the server clock.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub status: RoomStatus,
    pub current_question_index: usize,
    pub question_count: usize,
    /// Seconds until play begins; zero outside STARTING.
    pub countdown_seconds: i64,
    /// Seconds left in the answer window; zero outside IN_PROGRESS.
    pub question_seconds_left: i64,
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub user_id: String,
    pub display_name: String,
    pub score: i32,
    pub correct_answers: u32,
    pub has_answered_current: bool,
    pub is_online: bool,
}

fn snapshot_of(room: &Room, now: i64) -> RoomSnapshot {
    let countdown_seconds = if room.status == RoomStatus::Starting {
        turn_clock::countdown_remaining_secs(room.starting_at, now)
    } else {
        0
    };
    let question_seconds_left = if room.status == RoomStatus::InProgress {
        turn_clock::question_remaining_secs(room.question_started_at, now)
    } else {
        0
    };

    let mut players: Vec<PlayerView> = room
        .players
        .values()
        .map(|p| PlayerView {
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            score: p.score,
            correct_answers: p.correct_answers,
            has_answered_current: p.has_answered(room.current_question_index),
            is_online: p.is_online,
        })
        .collect();
    players.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    RoomSnapshot {
        room_id: room.room_id.clone(),
        status: room.status,
        current_question_index: room.current_question_index,
        question_count: room.question_count,
        countdown_seconds,
        question_seconds_left,
        players,
    }
}

/// A live view over one room. Attach checks the room exists, then every
/// store push becomes a fresh snapshot; dropping the observer tears the
/// subscription down.
pub struct RoomObserver {
    rooms: Arc<dyn RoomRepository>,
    source: UnboundedReceiver<Option<Room>>,
    current: RoomSnapshot,
}

impl RoomObserver {
    pub async fn attach(
        rooms: Arc<dyn RoomRepository>,
        room_id: &str,
    ) -> Result<Self, RoomObserverError> {
        let mut source = rooms.subscribe(room_id).await?;
        let first = match source.recv().await {
            Some(Some(room)) => room,
            _ => return Err(RoomObserverError::RoomNotFound),
        };
        let current = snapshot_of(&first, rooms.now());
        debug!(room_id, status = ?current.status, "observer attached");
        Ok(RoomObserver {
            rooms,
            source,
            current,
        })
    }

    /// The snapshot from the last push, re-evaluated countdowns included.
    pub fn snapshot(&self) -> &RoomSnapshot {
        &self.current
    }

    /// Waits for the next room change. None once the room is deleted or
    /// the subscription ends.
    pub async fn next(&mut self) -> Option<RoomSnapshot> {
        match self.source.recv().await? {
            Some(room) => {
                self.current = snapshot_of(&room, self.rooms.now());
                Some(self.current.clone())
            }
            None => None,
        }
    }
}
