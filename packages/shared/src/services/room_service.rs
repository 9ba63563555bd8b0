use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MAX_TX_RETRIES;
use crate::models::room::{Answer, Room, RoomStatus};
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::room_repository::{RoomMutation, RoomRepository, RoomTxFn};
use crate::services::errors::room_service_errors::RoomServiceError;
use crate::services::scoring;
use crate::services::stats_service::StatsService;

/// Drives a room through its lifecycle: countdown into play, answer intake,
/// question advancement, and the finish that produces a MatchResult.
///
/// All mutation goes through room transactions, so two concurrent submits
/// settle on exactly one committed ordering and the finish transition runs
/// exactly once.
pub struct RoomService {
    rooms: Arc<dyn RoomRepository>,
    stats: Arc<StatsService>,
}

/// Moves an IN_PROGRESS room past a settled question: the next question is
/// made current with a fresh window stamp, or the room finishes after the
/// last one.
fn advance(room: &mut Room, now: i64) {
    if room.current_question_index + 1 < room.question_count {
        room.current_question_index += 1;
        room.question_started_at = now;
    } else {
        room.status = RoomStatus::Finished;
        room.end_time = now;
        room.result_id = Some(Uuid::new_v4().to_string());
    }
}

impl RoomService {
    pub fn new(rooms: Arc<dyn RoomRepository>, stats: Arc<StatsService>) -> Self {
        RoomService { rooms, stats }
    }

    pub async fn room(&self, room_id: &str) -> Result<Room, RoomServiceError> {
        self.rooms
            .get(room_id)
            .await?
            .ok_or(RoomServiceError::RoomNotFound)
    }

    /// Runs one room transaction with a bounded retry on optimistic-race
    /// loss. Returns the committed room when this call was the one that
    /// finished it, so the caller can settle the result.
    async fn mutate_with_retry<F>(
        &self,
        room_id: &str,
        mut f: F,
    ) -> Result<Option<Room>, RoomServiceError>
    where
        F: FnMut(Room, i64) -> Result<RoomMutation, RoomServiceError> + Send,
    {
        let mut attempts = 0;
        loop {
            let now = self.rooms.now();
            let mut error: Option<RoomServiceError> = None;
            let mut finished: Option<Room> = None;

            let tx: RoomTxFn<'_> = Box::new(|room| {
                error = None;
                finished = None;
                match f(room, now) {
                    Ok(mutation) => {
                        if let RoomMutation::Update(next) = &mutation {
                            if next.status == RoomStatus::Finished {
                                finished = Some(next.clone());
                            }
                        }
                        mutation
                    }
                    Err(e) => {
                        error = Some(e);
                        RoomMutation::Keep
                    }
                }
            });

            match self.rooms.mutate(room_id, tx).await {
                Ok(_) => {
                    if let Some(e) = error {
                        return Err(e);
                    }
                    return Ok(finished);
                }
                Err(RoomRepositoryError::Conflict) if attempts < MAX_TX_RETRIES => {
                    attempts += 1;
                    debug!(room_id, attempts, "room update conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// STARTING to IN_PROGRESS once the countdown has elapsed. Early calls
    /// and already-running rooms are no-ops; a WAITING room is rejected.
    pub async fn begin_play(&self, room_id: &str) -> Result<(), RoomServiceError> {
        self.mutate_with_retry(room_id, |mut room, now| match room.status {
            RoomStatus::Starting if now >= room.countdown_deadline() => {
                room.status = RoomStatus::InProgress;
                room.start_time = now;
                room.question_started_at = now;
                Ok(RoomMutation::Update(room))
            }
            RoomStatus::Starting | RoomStatus::InProgress => Ok(RoomMutation::Keep),
            RoomStatus::Waiting => Err(RoomServiceError::InvalidTransition(
                "room is still waiting for an opponent".to_string(),
            )),
            RoomStatus::Finished | RoomStatus::Cancelled => Ok(RoomMutation::Keep),
        })
        .await?;
        Ok(())
    }

    /// Records one player's answer for the current question. Correctness
    /// and score are recomputed server-side from the frozen question; the
    /// submission that completes the question also advances the room.
    pub async fn submit_answer(
        &self,
        room_id: &str,
        user_id: &str,
        question_index: usize,
        selected_answer: &str,
    ) -> Result<(), RoomServiceError> {
        let finished = self
            .mutate_with_retry(room_id, |mut room, now| {
                if room.status != RoomStatus::InProgress {
                    return Err(RoomServiceError::InvalidTransition(format!(
                        "cannot answer in a {:?} room",
                        room.status
                    )));
                }
                if question_index != room.current_question_index {
                    return Err(RoomServiceError::InvalidQuestionIndex);
                }
                let question = match room.current_question() {
                    Some(q) => q.clone(),
                    None => return Err(RoomServiceError::InvalidQuestionIndex),
                };
                let question_started_at = room.question_started_at;
                let player = match room.players.get_mut(user_id) {
                    Some(p) => p,
                    None => return Err(RoomServiceError::PlayerNotInRoom),
                };
                if player.has_answered(question_index) {
                    return Err(RoomServiceError::AlreadyAnswered);
                }

                let time_spent_ms = (now - question_started_at).max(0);
                let is_correct = selected_answer == question.correct_answer;
                player.answers.push(Answer {
                    question_index,
                    selected_answer: selected_answer.to_string(),
                    is_correct,
                    time_spent_ms,
                    submitted_at: now,
                });
                if is_correct {
                    player.correct_answers += 1;
                }
                player.score += scoring::answer_score(is_correct, time_spent_ms);
                player.last_seen = now;

                if room.all_answered_current() {
                    advance(&mut room, now);
                }
                Ok(RoomMutation::Update(room))
            })
            .await?;

        if let Some(room) = finished {
            self.finalize(&room).await?;
        }
        Ok(())
    }

    /// Clock-driven progress for one room: finish an elapsed countdown and
    /// advance past an expired answer window. A player who never answered
    /// simply has no answer entry for that index.
    pub async fn advance_overdue(&self, room_id: &str) -> Result<(), RoomServiceError> {
        let finished = self
            .mutate_with_retry(room_id, |mut room, now| match room.status {
                RoomStatus::Starting if now >= room.countdown_deadline() => {
                    room.status = RoomStatus::InProgress;
                    room.start_time = now;
                    room.question_started_at = now;
                    Ok(RoomMutation::Update(room))
                }
                RoomStatus::InProgress
                    if room.all_answered_current() || now >= room.question_deadline() =>
                {
                    advance(&mut room, now);
                    Ok(RoomMutation::Update(room))
                }
                _ => Ok(RoomMutation::Keep),
            })
            .await?;

        if let Some(room) = finished {
            self.finalize(&room).await?;
        }
        Ok(())
    }

    pub async fn set_ready(
        &self,
        room_id: &str,
        user_id: &str,
        is_ready: bool,
    ) -> Result<(), RoomServiceError> {
        self.mutate_with_retry(room_id, |mut room, now| {
            if room.status != RoomStatus::Waiting {
                return Err(RoomServiceError::InvalidTransition(format!(
                    "cannot change readiness in a {:?} room",
                    room.status
                )));
            }
            match room.players.get_mut(user_id) {
                Some(player) => {
                    player.is_ready = is_ready;
                    player.last_seen = now;
                    Ok(RoomMutation::Update(room))
                }
                None => Err(RoomServiceError::PlayerNotInRoom),
            }
        })
        .await?;
        Ok(())
    }

    /// Presence signal, last writer wins. Ignored once the room is
    /// terminal.
    pub async fn heartbeat(
        &self,
        room_id: &str,
        user_id: &str,
        is_online: bool,
    ) -> Result<(), RoomServiceError> {
        self.mutate_with_retry(room_id, |mut room, now| {
            if room.status.is_terminal() {
                return Ok(RoomMutation::Keep);
            }
            match room.players.get_mut(user_id) {
                Some(player) => {
                    player.is_online = is_online;
                    player.last_seen = now;
                    Ok(RoomMutation::Update(room))
                }
                None => Err(RoomServiceError::PlayerNotInRoom),
            }
        })
        .await?;
        Ok(())
    }

    /// Removes a player. A room left with fewer than two players before
    /// FINISHED is cancelled and kept for history. Leaving a terminal
    /// room, or a room the player is not in, is a no-op.
    pub async fn leave(&self, room_id: &str, user_id: &str) -> Result<(), RoomServiceError> {
        let mut code_to_release: Option<String> = None;
        self.mutate_with_retry(room_id, |mut room, now| {
            code_to_release = None;
            if room.status.is_terminal() {
                return Ok(RoomMutation::Keep);
            }
            if room.players.remove(user_id).is_none() {
                return Ok(RoomMutation::Keep);
            }
            if room.status != RoomStatus::Waiting || room.players.is_empty() {
                room.status = RoomStatus::Cancelled;
                room.end_time = now;
                code_to_release = Some(room.short_code.clone());
                info!(room_id = %room.room_id, user_id, "player left, room cancelled");
            }
            Ok(RoomMutation::Update(room))
        })
        .await?;

        if let Some(code) = code_to_release.filter(|c| !c.is_empty()) {
            self.rooms.release_code(&code).await?;
        }
        Ok(())
    }

    /// Host-only cancellation of a room nobody has joined yet. The room is
    /// kept in its terminal state; only the short code is freed.
    pub async fn cancel(&self, room_id: &str, user_id: &str) -> Result<(), RoomServiceError> {
        let mut code_to_release: Option<String> = None;
        self.mutate_with_retry(room_id, |mut room, now| {
            code_to_release = None;
            if !room.is_host(user_id) {
                return Err(RoomServiceError::InvalidTransition(
                    "only the host may cancel the room".to_string(),
                ));
            }
            if room.status != RoomStatus::Waiting {
                return Err(RoomServiceError::InvalidTransition(format!(
                    "cannot cancel a {:?} room",
                    room.status
                )));
            }
            room.status = RoomStatus::Cancelled;
            room.end_time = now;
            code_to_release = Some(room.short_code.clone());
            Ok(RoomMutation::Update(room))
        })
        .await?;

        if let Some(code) = code_to_release.filter(|c| !c.is_empty()) {
            self.rooms.release_code(&code).await?;
        }
        Ok(())
    }

    /// Re-runs result recording for an already-FINISHED room. Safe to call
    /// repeatedly; used to repair a crash between finishing and recording.
    pub async fn settle(&self, room_id: &str) -> Result<(), RoomServiceError> {
        let room = self.room(room_id).await?;
        if room.status == RoomStatus::Finished {
            self.finalize(&room).await?;
        }
        Ok(())
    }

    /// Result pipeline for a freshly finished room: free the short code,
    /// build the MatchResult from pre-match ratings, archive it, fold it
    /// into both players' stats. Every step tolerates re-execution.
    async fn finalize(&self, room: &Room) -> Result<(), RoomServiceError> {
        if !room.short_code.is_empty()
            && self.rooms.resolve_code(&room.short_code).await?.as_deref()
                == Some(room.room_id.as_str())
        {
            self.rooms.release_code(&room.short_code).await?;
        }

        let result_id = match &room.result_id {
            Some(id) => id.clone(),
            None => return Ok(()),
        };

        let result = match self.stats.get_result(&result_id).await? {
            Some(existing) => existing,
            None => {
                let mut ratings = HashMap::new();
                for user_id in room.players.keys() {
                    let stats = self.stats.user_stats(user_id).await?;
                    ratings.insert(user_id.clone(), stats.rating);
                }
                let built =
                    scoring::build_match_result(room, &result_id, &ratings, self.rooms.now());
                self.stats.record_result(&built).await?;
                built
            }
        };
        self.stats.apply_result(&result).await?;

        info!(
            room_id = %room.room_id,
            result_id = %result_id,
            winner = ?result.winner_id,
            is_draw = result.is_draw,
            "match finished"
        );
        Ok(())
    }
}
