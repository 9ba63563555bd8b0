pub mod errors;
pub mod invitation_service;
pub mod matchmaking_service;
pub mod room_observer;
pub mod room_service;
pub mod scoring;
pub mod stats_service;
pub mod turn_clock;
