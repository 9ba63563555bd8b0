pub mod invitation_repository_errors;
pub mod queue_repository_errors;
pub mod room_repository_errors;
pub mod stats_repository_errors;
