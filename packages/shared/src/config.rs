//! Tunables for matchmaking, room timing and rating updates.
//!
//! All durations are epoch-millisecond spans measured against the store's
//! server clock, never against a client-local timer.

/// A quick-match queue entry (or an unclaimed match ticket) older than this
/// is pruned on the next queue scan.
pub const QUEUE_ENTRY_TTL_MS: i64 = 60_000;

/// Pre-match countdown between STARTING and IN_PROGRESS.
pub const COUNTDOWN_MS: i64 = 3_000;

/// Answer window per question. Score is the whole seconds left at submission.
pub const QUESTION_WINDOW_MS: i64 = 20_000;

/// Invitations expire five minutes after creation.
pub const INVITATION_TTL_MS: i64 = 300_000;

/// How often a room mutation is retried after losing an optimistic
/// transaction before surfacing a conflict to the caller.
pub const MAX_TX_RETRIES: u32 = 3;

/// Starting rating for a player with no recorded matches.
pub const DEFAULT_RATING: i32 = 1000;

/// Elo K-factor; a single match moves a rating by at most this much.
pub const ELO_K: f64 = 32.0;
pub const ELO_MAX_DELTA: i32 = 32;

/// Short join codes: 6 characters, ambiguous glyphs (0/O, 1/I) excluded.
pub const SHORT_CODE_LEN: usize = 6;
pub const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Attempts at generating a short code before giving up on a collision storm.
pub const SHORT_CODE_MAX_ATTEMPTS: u32 = 8;
