use std::sync::Arc;
use std::time::Duration;

use shared::questions::FixedQuestionProvider;
use shared::repositories::queue_repository::StoreQueueRepository;
use shared::repositories::room_repository::StoreRoomRepository;
use shared::repositories::stats_repository::StoreStatsRepository;
use shared::services::matchmaking_service::MatchmakingService;
use shared::services::room_service::RoomService;
use shared::services::stats_service::StatsService;
use shared::store::MemoryStore;
use tracing::info;

mod processor;
use processor::MatchProcessor;

fn env_ms(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let store = Arc::new(MemoryStore::new());
    let question_pool = env_ms("QUESTION_POOL_SIZE", 50) as usize;

    // Create services
    let queue_repository = Arc::new(StoreQueueRepository::new(store.clone()));
    let room_repository = Arc::new(StoreRoomRepository::new(store.clone()));
    let stats_repository = Arc::new(StoreStatsRepository::new(store.clone()));
    let questions = Arc::new(FixedQuestionProvider::with_placeholder_pool(question_pool));

    let matchmaking_service = Arc::new(MatchmakingService::new(
        queue_repository,
        room_repository.clone(),
        questions,
    ));
    let stats_service = Arc::new(StatsService::new(stats_repository));
    let room_service = Arc::new(RoomService::new(
        room_repository.clone(),
        stats_service.clone(),
    ));

    let processor = MatchProcessor::new(
        matchmaking_service,
        room_service,
        room_repository,
        stats_service,
    );

    let interval = Duration::from_millis(env_ms("SWEEP_INTERVAL_MS", 1_000));
    info!(interval_ms = interval.as_millis() as u64, "match processor starting");
    processor.run(interval).await;
    Ok(())
}
