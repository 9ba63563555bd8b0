pub mod invitation;
pub mod match_result;
pub mod queue;
pub mod room;
pub mod user_stats;
