//! Shared deadline model for the pre-match countdown and per-question
//! answer windows.
//!
//! There is one absolute deadline per phase, derived from a server-assigned
//! timestamp stored on the room, never a per-client countdown that could
//! drift between devices. Any participant (or the background sweep) may
//! observe "now past deadline" and fire the time-elapsed transition; the
//! state machine's post-merge re-check collapses duplicate attempts.

use std::time::Duration;

use crate::config::{COUNTDOWN_MS, QUESTION_WINDOW_MS};

/// Absolute end of the STARTING countdown.
pub fn countdown_deadline(starting_at: i64) -> i64 {
    starting_at + COUNTDOWN_MS
}

/// Absolute end of the answer window for the question stamped at
/// `question_started_at`.
pub fn question_deadline(question_started_at: i64) -> i64 {
    question_started_at + QUESTION_WINDOW_MS
}

pub fn countdown_elapsed(starting_at: i64, now: i64) -> bool {
    now >= countdown_deadline(starting_at)
}

pub fn question_elapsed(question_started_at: i64, now: i64) -> bool {
    now >= question_deadline(question_started_at)
}

/// Whole seconds left in the countdown, clamped at zero.
pub fn countdown_remaining_secs(starting_at: i64, now: i64) -> i64 {
    remaining_secs(countdown_deadline(starting_at), now)
}

/// Whole seconds left in the current answer window, clamped at zero.
pub fn question_remaining_secs(question_started_at: i64, now: i64) -> i64 {
    remaining_secs(question_deadline(question_started_at), now)
}

fn remaining_secs(deadline: i64, now: i64) -> i64 {
    ((deadline - now).max(0) + 999) / 1_000
}

/// Cooperative wait until `deadline` as measured by the store clock that
/// produced `now`. Callers race this against the next room push
/// (`tokio::select!`) so a state change wakes them early.
pub async fn wait_until(deadline: i64, now: i64) {
    let remaining = deadline - now;
    if remaining > 0 {
        tokio::time::sleep(Duration::from_millis(remaining as u64)).await;
    }
}
