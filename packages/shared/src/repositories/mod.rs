pub mod errors;
pub mod invitation_repository;
pub mod queue_repository;
pub mod room_repository;
pub mod stats_repository;

/// Path layout of the shared store. The queue is a single node so that
/// entry add/remove and ticket deposit commit in one atomic step.
pub const QUEUE_PATH: &str = "queue";
pub const ROOMS_PATH: &str = "rooms";
pub const SHORTCODES_PATH: &str = "shortcodes";
pub const STATS_PATH: &str = "stats";
pub const RESULTS_PATH: &str = "results";
pub const INVITATIONS_PATH: &str = "invitations";

pub(crate) fn room_path(room_id: &str) -> String {
    format!("{}/{}", ROOMS_PATH, room_id)
}

pub(crate) fn short_code_path(code: &str) -> String {
    format!("{}/{}", SHORTCODES_PATH, code)
}

pub(crate) fn stats_path(user_id: &str) -> String {
    format!("{}/{}", STATS_PATH, user_id)
}

pub(crate) fn result_path(result_id: &str) -> String {
    format!("{}/{}", RESULTS_PATH, result_id)
}

pub(crate) fn invitation_path(invitation_id: &str) -> String {
    format!("{}/{}", INVITATIONS_PATH, invitation_id)
}
