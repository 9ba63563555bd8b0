use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{MAX_TX_RETRIES, SHORT_CODE_ALPHABET, SHORT_CODE_LEN, SHORT_CODE_MAX_ATTEMPTS};
use crate::models::queue::QueueEntry;
use crate::models::room::{Player, Room, RoomMode, RoomStatus};
use crate::questions::{validate_question_set, QuestionProvider};
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::queue_repository::{ClaimOutcome, QueueRepository};
use crate::repositories::room_repository::{RoomMutation, RoomRepository};
use crate::services::errors::matchmaking_service_errors::MatchmakingServiceError;

#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// Matched immediately; the new room is already counting down.
    Paired(String),
    /// No compatible opponent yet; poll until matched or expired.
    Waiting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Paired(String),
    Waiting,
    /// The entry aged out (or was never made); the caller must re-enqueue.
    Expired,
}

/// Pairs quick-match players and manages friend rooms joined by short code.
///
/// Pairing runs opportunistically on every enqueue and as a periodic sweep;
/// both paths funnel through the queue repository's atomic pair step, so a
/// player is never seated in two rooms.
pub struct MatchmakingService {
    queue: Arc<dyn QueueRepository>,
    rooms: Arc<dyn RoomRepository>,
    questions: Arc<dyn QuestionProvider>,
}

fn generate_short_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_CODE_LEN)
        .map(|_| SHORT_CODE_ALPHABET[rng.gen_range(0..SHORT_CODE_ALPHABET.len())] as char)
        .collect()
}

/// A join argument is a short code when it has the code shape; anything
/// else is treated as a room id.
fn looks_like_short_code(input: &str) -> bool {
    input.len() == SHORT_CODE_LEN
        && input
            .bytes()
            .all(|b| SHORT_CODE_ALPHABET.contains(&b.to_ascii_uppercase()))
}

impl MatchmakingService {
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        rooms: Arc<dyn RoomRepository>,
        questions: Arc<dyn QuestionProvider>,
    ) -> Self {
        MatchmakingService {
            queue,
            rooms,
            questions,
        }
    }

    /// Joins the quick-match queue. If a compatible opponent is already
    /// waiting, the match is made inline and the room id returned.
    pub async fn enqueue(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
        rating: i32,
        difficulty: &str,
        question_count: usize,
    ) -> Result<EnqueueOutcome, MatchmakingServiceError> {
        let entry = QueueEntry {
            user_id: user_id.to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            rating,
            difficulty: difficulty.to_string(),
            question_count,
            enqueued_at: self.queue.now(),
        };

        let state = self.queue.upsert_entry(&entry).await?;
        let candidate = match state.best_candidate(&entry, self.queue.now()) {
            Some(candidate) => candidate.clone(),
            None => return Ok(EnqueueOutcome::Waiting),
        };

        // The longer-waiting player hosts.
        match self.make_quick_match(&candidate, &entry).await? {
            Some(room_id) => {
                // Consume our own ticket; the partner claims theirs on poll.
                let _ = self.queue.claim(user_id).await?;
                Ok(EnqueueOutcome::Paired(room_id))
            }
            None => match self.queue.claim(user_id).await? {
                ClaimOutcome::Ticket(room_id) => Ok(EnqueueOutcome::Paired(room_id)),
                _ => Ok(EnqueueOutcome::Waiting),
            },
        }
    }

    /// One poll for a queued player.
    pub async fn poll(&self, user_id: &str) -> Result<PollOutcome, MatchmakingServiceError> {
        Ok(match self.queue.claim(user_id).await? {
            ClaimOutcome::Ticket(room_id) => PollOutcome::Paired(room_id),
            ClaimOutcome::Queued => PollOutcome::Waiting,
            ClaimOutcome::Absent => PollOutcome::Expired,
        })
    }

    pub async fn leave_queue(&self, user_id: &str) -> Result<(), MatchmakingServiceError> {
        self.queue.remove_user(user_id).await?;
        Ok(())
    }

    /// Periodic pairing pass over the whole queue, for matches the enqueue
    /// path missed (for example two racing enqueues that each saw an empty
    /// queue). Returns how many rooms were made.
    pub async fn sweep_queue(&self) -> Result<usize, MatchmakingServiceError> {
        let now = self.queue.now();
        let state = self.queue.state().await?;
        let mut entries: Vec<QueueEntry> = state.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            (a.enqueued_at, a.user_id.as_str()).cmp(&(b.enqueued_at, b.user_id.as_str()))
        });

        let mut taken: HashSet<String> = HashSet::new();
        let mut made = 0;
        for entry in &entries {
            if taken.contains(&entry.user_id) {
                continue;
            }
            let partner = entries.iter().find(|e| {
                !taken.contains(&e.user_id) && e.is_compatible_with(entry) && !e.is_expired(now)
            });
            let Some(partner) = partner else { continue };

            if self.make_quick_match(entry, partner).await?.is_some() {
                taken.insert(entry.user_id.clone());
                taken.insert(partner.user_id.clone());
                made += 1;
            }
        }
        Ok(made)
    }

    /// Creates the room and commits the pairing. Returns None (and removes
    /// the room again) when the queue moved on underneath us.
    async fn make_quick_match(
        &self,
        host: &QueueEntry,
        guest: &QueueEntry,
    ) -> Result<Option<String>, MatchmakingServiceError> {
        let questions = self
            .questions
            .questions(&host.difficulty, host.question_count)
            .await?;
        validate_question_set(&questions, host.question_count)?;

        let now = self.rooms.now();
        let mut room = Room::new(
            Player::new(&host.user_id, &host.username, &host.display_name, now),
            RoomMode::QuickMatch,
            &host.difficulty,
            questions,
            "",
            now,
        );
        room.players.insert(
            guest.user_id.clone(),
            Player::new(&guest.user_id, &guest.username, &guest.display_name, now),
        );
        room.status = RoomStatus::Starting;
        room.starting_at = now;

        self.rooms.create(&room).await?;
        if self
            .queue
            .pair(&guest.user_id, &host.user_id, &room.room_id)
            .await?
        {
            info!(
                room_id = %room.room_id,
                host = %host.user_id,
                guest = %guest.user_id,
                "quick match paired"
            );
            Ok(Some(room.room_id))
        } else {
            // One of the entries vanished between scan and pair; the room
            // was never visible to either player.
            debug!(room_id = %room.room_id, "pairing lost its race, removing room");
            self.rooms
                .mutate(&room.room_id, Box::new(|_| RoomMutation::Delete))
                .await?;
            Ok(None)
        }
    }

    /// Creates a WAITING friend room with a unique short join code.
    pub async fn create_room(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
        difficulty: &str,
        question_count: usize,
    ) -> Result<Room, MatchmakingServiceError> {
        let questions = self.questions.questions(difficulty, question_count).await?;
        validate_question_set(&questions, question_count)?;

        let now = self.rooms.now();
        let mut room = Room::new(
            Player::new(user_id, username, display_name, now),
            RoomMode::FriendMatch,
            difficulty,
            questions,
            "",
            now,
        );

        for attempt in 0..SHORT_CODE_MAX_ATTEMPTS {
            let code = generate_short_code();
            if self.rooms.reserve_code(&code, &room.room_id).await? {
                room.short_code = code;
                self.rooms.create(&room).await?;
                info!(room_id = %room.room_id, short_code = %room.short_code, "friend room created");
                return Ok(room);
            }
            debug!(attempt, "short code collision, regenerating");
        }
        warn!(room_id = %room.room_id, "short code space exhausted");
        Err(MatchmakingServiceError::ShortCodeExhausted)
    }

    /// Seats a second player by short code or room id. Re-joining a room
    /// the player is already in is a no-op that returns the current state;
    /// the join that fills the room starts the countdown. A room with both
    /// seats taken reports RoomFull whatever its status; a short-handed
    /// room that has left WAITING reports RoomNotJoinable.
    pub async fn join_room(
        &self,
        code_or_id: &str,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<Room, MatchmakingServiceError> {
        let room_id = if looks_like_short_code(code_or_id) {
            match self
                .rooms
                .resolve_code(&code_or_id.to_ascii_uppercase())
                .await?
            {
                Some(room_id) => room_id,
                None => code_or_id.to_string(),
            }
        } else {
            code_or_id.to_string()
        };

        let mut attempts = 0;
        loop {
            let now = self.rooms.now();
            let mut error: Option<MatchmakingServiceError> = None;
            let mut joined: Option<Room> = None;

            let result = self
                .rooms
                .mutate(
                    &room_id,
                    Box::new(|mut room| {
                        error = None;
                        joined = None;
                        if room.players.contains_key(user_id) {
                            joined = Some(room);
                            return RoomMutation::Keep;
                        }
                        if room.is_full() {
                            error = Some(MatchmakingServiceError::RoomFull);
                            return RoomMutation::Keep;
                        }
                        if room.status != RoomStatus::Waiting {
                            error = Some(MatchmakingServiceError::RoomNotJoinable);
                            return RoomMutation::Keep;
                        }
                        room.players.insert(
                            user_id.to_string(),
                            Player::new(user_id, username, display_name, now),
                        );
                        if room.is_full() {
                            room.status = RoomStatus::Starting;
                            room.starting_at = now;
                        }
                        joined = Some(room.clone());
                        RoomMutation::Update(room)
                    }),
                )
                .await;

            match result {
                Ok(_) => {
                    if let Some(e) = error {
                        return Err(e);
                    }
                    let room = joined.ok_or(MatchmakingServiceError::Conflict)?;
                    info!(room_id = %room.room_id, user_id, "player joined room");
                    return Ok(room);
                }
                Err(RoomRepositoryError::Conflict) if attempts < MAX_TX_RETRIES => {
                    attempts += 1;
                    debug!(room_id = %room_id, attempts, "join conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QUEUE_ENTRY_TTL_MS;
    use crate::questions::FixedQuestionProvider;
    use crate::repositories::queue_repository::StoreQueueRepository;
    use crate::repositories::room_repository::StoreRoomRepository;
    use crate::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        rooms: Arc<StoreRoomRepository>,
        service: MatchmakingService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(StoreRoomRepository::new(store.clone()));
        let service = MatchmakingService::new(
            Arc::new(StoreQueueRepository::new(store.clone())),
            rooms.clone(),
            Arc::new(FixedQuestionProvider::with_placeholder_pool(10)),
        );
        Harness {
            store,
            rooms,
            service,
        }
    }

    async fn enqueue(h: &Harness, user_id: &str, difficulty: &str) -> EnqueueOutcome {
        h.service
            .enqueue(
                user_id,
                &format!("{}_name", user_id),
                &user_id.to_uppercase(),
                1000,
                difficulty,
                3,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn second_compatible_enqueue_pairs_immediately() {
        let h = harness();
        assert_eq!(enqueue(&h, "a", "medium").await, EnqueueOutcome::Waiting);

        let EnqueueOutcome::Paired(room_id) = enqueue(&h, "b", "medium").await else {
            panic!("expected immediate pairing");
        };

        let room = h.rooms.get(&room_id).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Starting);
        assert!(room.starting_at > 0);
        assert_eq!(room.mode, RoomMode::QuickMatch);
        assert!(room.players.contains_key("a"));
        assert!(room.players.contains_key("b"));
        // The earlier arrival hosts.
        assert!(room.is_host("a"));

        // The partner learns the room on its next poll, exactly once.
        assert_eq!(
            h.service.poll("a").await.unwrap(),
            PollOutcome::Paired(room_id)
        );
        assert_eq!(h.service.poll("a").await.unwrap(), PollOutcome::Expired);
    }

    #[tokio::test]
    async fn incompatible_entries_never_pair() {
        let h = harness();
        assert_eq!(enqueue(&h, "a", "easy").await, EnqueueOutcome::Waiting);
        assert_eq!(enqueue(&h, "b", "hard").await, EnqueueOutcome::Waiting);
        assert_eq!(h.service.poll("a").await.unwrap(), PollOutcome::Waiting);
        assert_eq!(h.service.poll("b").await.unwrap(), PollOutcome::Waiting);
    }

    #[tokio::test]
    async fn expired_entry_polls_expired() {
        let h = harness();
        assert_eq!(enqueue(&h, "a", "medium").await, EnqueueOutcome::Waiting);
        h.store.advance_clock(QUEUE_ENTRY_TTL_MS + 1_000);
        assert_eq!(h.service.poll("a").await.unwrap(), PollOutcome::Expired);
    }

    #[tokio::test]
    async fn leave_queue_then_poll_reports_expired() {
        let h = harness();
        assert_eq!(enqueue(&h, "a", "medium").await, EnqueueOutcome::Waiting);
        h.service.leave_queue("a").await.unwrap();
        assert_eq!(h.service.poll("a").await.unwrap(), PollOutcome::Expired);
    }

    #[tokio::test]
    async fn sweep_pairs_compatible_waiters() {
        let h = harness();
        assert_eq!(enqueue(&h, "a", "medium").await, EnqueueOutcome::Waiting);
        assert_eq!(enqueue(&h, "c", "hard").await, EnqueueOutcome::Waiting);
        // Plant a compatible opponent directly so the enqueue path never
        // sees it.
        let b = QueueEntry {
            user_id: "b".into(),
            username: "b_name".into(),
            display_name: "B".into(),
            rating: 1000,
            difficulty: "medium".into(),
            question_count: 3,
            enqueued_at: h.service.queue.now(),
        };
        h.service.queue.upsert_entry(&b).await.unwrap();

        assert_eq!(h.service.sweep_queue().await.unwrap(), 1);

        let PollOutcome::Paired(room_a) = h.service.poll("a").await.unwrap() else {
            panic!("a should be paired");
        };
        let PollOutcome::Paired(room_b) = h.service.poll("b").await.unwrap() else {
            panic!("b should be paired");
        };
        assert_eq!(room_a, room_b);
        assert_eq!(h.service.poll("c").await.unwrap(), PollOutcome::Waiting);

        // Nothing left to pair.
        assert_eq!(h.service.sweep_queue().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn friend_room_flow_creates_resolves_and_starts_when_full() {
        let h = harness();
        let room = h
            .service
            .create_room("host", "host_name", "Host", "easy", 3)
            .await
            .unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.short_code.len(), SHORT_CODE_LEN);
        assert_eq!(
            h.rooms.resolve_code(&room.short_code).await.unwrap(),
            Some(room.room_id.clone())
        );

        let joined = h
            .service
            .join_room(&room.short_code, "guest", "guest_name", "Guest")
            .await
            .unwrap();
        assert_eq!(joined.room_id, room.room_id);
        assert_eq!(joined.status, RoomStatus::Starting);
        assert!(joined.starting_at > 0);
        assert!(joined.players.contains_key("guest"));
    }

    #[tokio::test]
    async fn join_accepts_lowercase_codes_and_raw_room_ids() {
        let h = harness();
        let room = h
            .service
            .create_room("host", "host_name", "Host", "easy", 3)
            .await
            .unwrap();

        let joined = h
            .service
            .join_room(
                &room.short_code.to_ascii_lowercase(),
                "guest",
                "guest_name",
                "Guest",
            )
            .await
            .unwrap();
        assert_eq!(joined.room_id, room.room_id);

        // Rejoin by raw room id is an idempotent no-op.
        let again = h
            .service
            .join_room(&room.room_id, "guest", "guest_name", "Guest")
            .await
            .unwrap();
        assert_eq!(again.players.len(), 2);
        assert_eq!(again.status, RoomStatus::Starting);
    }

    #[tokio::test]
    async fn join_errors_cover_missing_full_and_started_rooms() {
        let h = harness();
        assert!(matches!(
            h.service.join_room("ZZZZZ2", "x", "x", "X").await,
            Err(MatchmakingServiceError::RoomNotFound)
        ));

        let room = h
            .service
            .create_room("host", "host_name", "Host", "easy", 3)
            .await
            .unwrap();
        h.service
            .join_room(&room.short_code, "guest", "guest_name", "Guest")
            .await
            .unwrap();

        // Both seats taken reads as full, whatever the status.
        assert!(matches!(
            h.service
                .join_room(&room.short_code, "third", "third_name", "Third")
                .await,
            Err(MatchmakingServiceError::RoomFull)
        ));

        // A short-handed room that has left WAITING is not joinable.
        h.rooms
            .mutate(
                &room.room_id,
                Box::new(|mut r| {
                    r.players.remove("guest");
                    RoomMutation::Update(r)
                }),
            )
            .await
            .unwrap();
        assert!(matches!(
            h.service
                .join_room(&room.short_code, "third", "third_name", "Third")
                .await,
            Err(MatchmakingServiceError::RoomNotJoinable)
        ));
    }

    #[tokio::test]
    async fn question_provider_failure_surfaces_before_any_write() {
        let h = harness();
        let err = h
            .service
            .create_room("host", "host_name", "Host", "easy", 50)
            .await;
        assert!(matches!(
            err,
            Err(MatchmakingServiceError::QuestionProvider(_))
        ));
    }
}
