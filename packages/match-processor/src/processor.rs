use std::sync::Arc;
use std::time::Duration;

use shared::models::room::{Room, RoomStatus};
use shared::repositories::room_repository::RoomRepository;
use shared::services::matchmaking_service::MatchmakingService;
use shared::services::room_service::RoomService;
use shared::services::stats_service::StatsService;
use tracing::{debug, error, info};

/// Background driver for everything clock-based: pairs queue stragglers,
/// fires time-elapsed room transitions that no client triggered (countdown
/// end, answer-window expiry), and settles finished rooms whose result was
/// never recorded.
///
/// Every action it takes goes through the same transactional services the
/// players use, so a sweep racing a client submit is just another
/// concurrent writer.
pub struct MatchProcessor {
    matchmaking: Arc<MatchmakingService>,
    rooms: Arc<RoomService>,
    room_repository: Arc<dyn RoomRepository>,
    stats: Arc<StatsService>,
}

impl MatchProcessor {
    pub fn new(
        matchmaking: Arc<MatchmakingService>,
        rooms: Arc<RoomService>,
        room_repository: Arc<dyn RoomRepository>,
        stats: Arc<StatsService>,
    ) -> Self {
        Self {
            matchmaking,
            rooms,
            room_repository,
            stats,
        }
    }

    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One sweep. Per-room failures are logged and skipped; one bad room
    /// never stalls the rest.
    pub async fn run_once(&self) {
        match self.matchmaking.sweep_queue().await {
            Ok(0) => {}
            Ok(made) => info!(rooms = made, "queue sweep paired waiting players"),
            Err(e) => error!("queue sweep failed: {}", e),
        }

        let room_ids = match self.room_repository.room_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("room listing failed: {}", e);
                return;
            }
        };
        debug!(rooms = room_ids.len(), "sweeping rooms for due transitions");
        for room_id in room_ids {
            let room = match self.room_repository.get(&room_id).await {
                Ok(Some(room)) => room,
                Ok(None) => continue,
                Err(e) => {
                    error!("room read failed for {}: {}", room_id, e);
                    continue;
                }
            };
            match room.status {
                RoomStatus::Finished => self.settle_if_unrecorded(&room).await,
                RoomStatus::Cancelled => {}
                _ => {
                    if let Err(e) = self.rooms.advance_overdue(&room_id).await {
                        error!("deadline sweep failed for room {}: {}", room_id, e);
                    }
                }
            }
        }
    }

    /// Repairs a crash between the FINISHED commit and result recording:
    /// a finished room whose result id has no stored result gets its
    /// result pipeline re-run.
    async fn settle_if_unrecorded(&self, room: &Room) {
        let Some(result_id) = &room.result_id else {
            return;
        };
        match self.stats.get_result(result_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(room_id = %room.room_id, "finished room missing its result, settling");
                if let Err(e) = self.rooms.settle(&room.room_id).await {
                    error!("settle failed for room {}: {}", room.room_id, e);
                }
            }
            Err(e) => error!("result read failed for room {}: {}", room.room_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::{COUNTDOWN_MS, QUESTION_WINDOW_MS};
    use shared::models::room::RoomStatus;
    use shared::questions::FixedQuestionProvider;
    use shared::repositories::queue_repository::StoreQueueRepository;
    use shared::repositories::room_repository::{RoomMutation, StoreRoomRepository};
    use shared::repositories::stats_repository::StoreStatsRepository;
    use shared::services::matchmaking_service::{EnqueueOutcome, PollOutcome};
    use shared::services::stats_service::StatsService;
    use shared::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        rooms_repo: Arc<StoreRoomRepository>,
        matchmaking: Arc<MatchmakingService>,
        rooms: Arc<RoomService>,
        stats: Arc<StatsService>,
        processor: MatchProcessor,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let rooms_repo = Arc::new(StoreRoomRepository::new(store.clone()));
        let matchmaking = Arc::new(MatchmakingService::new(
            Arc::new(StoreQueueRepository::new(store.clone())),
            rooms_repo.clone(),
            Arc::new(FixedQuestionProvider::with_placeholder_pool(10)),
        ));
        let stats = Arc::new(StatsService::new(Arc::new(StoreStatsRepository::new(
            store.clone(),
        ))));
        let rooms = Arc::new(RoomService::new(rooms_repo.clone(), stats.clone()));
        let processor = MatchProcessor::new(
            matchmaking.clone(),
            rooms.clone(),
            rooms_repo.clone(),
            stats.clone(),
        );
        Harness {
            store,
            rooms_repo,
            matchmaking,
            rooms,
            stats,
            processor,
        }
    }

    #[tokio::test]
    async fn sweep_drives_a_full_match_from_queue_to_finish() {
        let h = harness();
        assert_eq!(
            h.matchmaking
                .enqueue("a", "a_name", "A", 1000, "medium", 1)
                .await
                .unwrap(),
            EnqueueOutcome::Waiting
        );
        let EnqueueOutcome::Paired(room_id) = h
            .matchmaking
            .enqueue("b", "b_name", "B", 1000, "medium", 1)
            .await
            .unwrap()
        else {
            panic!("expected pairing");
        };

        // Countdown elapses with no client call; the sweep starts play.
        h.store.advance_clock(COUNTDOWN_MS);
        h.processor.run_once().await;
        assert_eq!(
            h.rooms.room(&room_id).await.unwrap().status,
            RoomStatus::InProgress
        );

        // Nobody answers; the sweep times the question out and, it being
        // the last, finishes the room as a scoreless draw.
        h.store.advance_clock(QUESTION_WINDOW_MS);
        h.processor.run_once().await;
        let done = h.rooms.room(&room_id).await.unwrap();
        assert_eq!(done.status, RoomStatus::Finished);
        assert!(done.result_id.is_some());
    }

    #[tokio::test]
    async fn sweep_leaves_incompatible_waiters_queued() {
        let h = harness();
        h.matchmaking
            .enqueue("a", "a_name", "A", 1000, "medium", 3)
            .await
            .unwrap();
        h.matchmaking
            .enqueue("b", "b_name", "B", 1000, "hard", 3)
            .await
            .unwrap();

        h.processor.run_once().await;
        assert_eq!(h.matchmaking.poll("a").await.unwrap(), PollOutcome::Waiting);
        assert_eq!(h.matchmaking.poll("b").await.unwrap(), PollOutcome::Waiting);
    }

    #[tokio::test]
    async fn sweep_settles_a_finished_room_with_no_recorded_result() {
        let h = harness();
        h.matchmaking
            .enqueue("a", "a_name", "A", 1000, "medium", 1)
            .await
            .unwrap();
        let EnqueueOutcome::Paired(room_id) = h
            .matchmaking
            .enqueue("b", "b_name", "B", 1000, "medium", 1)
            .await
            .unwrap()
        else {
            panic!("expected pairing");
        };
        h.store.advance_clock(COUNTDOWN_MS);
        h.processor.run_once().await;

        // The finish committed but the process died before recording.
        h.rooms_repo
            .mutate(
                &room_id,
                Box::new(|mut room| {
                    room.status = RoomStatus::Finished;
                    room.end_time = room.question_started_at + 1_000;
                    room.result_id = Some("orphaned-result".to_string());
                    RoomMutation::Update(room)
                }),
            )
            .await
            .unwrap();
        assert!(h.stats.get_result("orphaned-result").await.unwrap().is_none());

        h.processor.run_once().await;

        let result = h
            .stats
            .get_result("orphaned-result")
            .await
            .unwrap()
            .expect("the sweep should record the missing result");
        assert!(result.is_draw, "no answers were given by either player");
        assert_eq!(h.stats.user_stats("a").await.unwrap().total_matches, 1);
        assert_eq!(h.stats.user_stats("b").await.unwrap().total_matches, 1);

        // Once recorded, later sweeps leave it alone.
        h.processor.run_once().await;
        assert_eq!(h.stats.user_stats("a").await.unwrap().total_matches, 1);
    }

    #[tokio::test]
    async fn idle_sweep_is_a_no_op() {
        let h = harness();
        h.processor.run_once().await;
        h.processor.run_once().await;
    }
}
