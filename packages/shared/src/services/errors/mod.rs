pub mod invitation_service_errors;
pub mod matchmaking_service_errors;
pub mod room_observer_errors;
pub mod room_service_errors;
pub mod stats_service_errors;
