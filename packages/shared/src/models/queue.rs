use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::QUEUE_ENTRY_TTL_MS;

/// A pending quick-match request. Created on enqueue, deleted on pairing or
/// pruned lazily once older than 60 seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub rating: i32,
    pub difficulty: String,
    pub question_count: usize,
    pub enqueued_at: i64,
}

impl QueueEntry {
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.enqueued_at > QUEUE_ENTRY_TTL_MS
    }

    /// Compatibility for pairing: same difficulty and question count,
    /// different user.
    pub fn is_compatible_with(&self, other: &QueueEntry) -> bool {
        self.user_id != other.user_id
            && self.difficulty == other.difficulty
            && self.question_count == other.question_count
    }
}

/// Deposited for the partner when a pairing transaction removes both
/// entries; claimed by the partner's next poll. Shares the queue TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTicket {
    pub room_id: String,
    pub issued_at: i64,
}

impl MatchTicket {
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.issued_at > QUEUE_ENTRY_TTL_MS
    }
}

/// The whole matchmaking queue lives in one store node so that entry
/// add/remove and ticket deposit are a single atomic step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    pub entries: HashMap<String, QueueEntry>,
    #[serde(default)]
    pub tickets: HashMap<String, MatchTicket>,
}

impl QueueState {
    /// Drops entries and tickets past their TTL. Evaluated lazily on every
    /// scan; nothing runs on a timer.
    pub fn prune_expired(&mut self, now: i64) {
        self.entries.retain(|_, e| !e.is_expired(now));
        self.tickets.retain(|_, t| !t.is_expired(now));
    }

    /// The compatible candidate that has waited longest (FIFO fairness);
    /// ties broken by user id for determinism.
    pub fn best_candidate(&self, for_entry: &QueueEntry, now: i64) -> Option<&QueueEntry> {
        self.entries
            .values()
            .filter(|e| e.is_compatible_with(for_entry) && !e.is_expired(now))
            .min_by_key(|e| (e.enqueued_at, e.user_id.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.tickets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str, difficulty: &str, count: usize, enqueued_at: i64) -> QueueEntry {
        QueueEntry {
            user_id: user_id.to_string(),
            username: format!("{}_name", user_id),
            display_name: user_id.to_uppercase(),
            rating: 1000,
            difficulty: difficulty.to_string(),
            question_count: count,
            enqueued_at,
        }
    }

    #[test]
    fn entry_expires_after_ttl() {
        let e = entry("a", "medium", 5, 1_000);
        assert!(!e.is_expired(1_000 + QUEUE_ENTRY_TTL_MS));
        assert!(e.is_expired(1_001 + QUEUE_ENTRY_TTL_MS));
    }

    #[test]
    fn compatibility_requires_same_difficulty_and_count() {
        let a = entry("a", "medium", 5, 0);
        assert!(a.is_compatible_with(&entry("b", "medium", 5, 0)));
        assert!(!a.is_compatible_with(&entry("b", "hard", 5, 0)));
        assert!(!a.is_compatible_with(&entry("b", "medium", 10, 0)));
        assert!(!a.is_compatible_with(&entry("a", "medium", 5, 0)));
    }

    #[test]
    fn best_candidate_is_fifo() {
        let mut state = QueueState::default();
        state.entries.insert("b".into(), entry("b", "medium", 5, 500));
        state.entries.insert("c".into(), entry("c", "medium", 5, 100));
        state.entries.insert("d".into(), entry("d", "hard", 5, 1));

        let caller = entry("a", "medium", 5, 600);
        let picked = state.best_candidate(&caller, 1_000).unwrap();
        assert_eq!(picked.user_id, "c");
    }

    #[test]
    fn expired_entry_is_never_a_candidate() {
        let mut state = QueueState::default();
        state.entries.insert("b".into(), entry("b", "medium", 5, 0));

        let caller = entry("a", "medium", 5, QUEUE_ENTRY_TTL_MS + 10);
        assert!(state
            .best_candidate(&caller, QUEUE_ENTRY_TTL_MS + 10)
            .is_none());
    }

    #[test]
    fn prune_drops_expired_entries_and_tickets() {
        let mut state = QueueState::default();
        state.entries.insert("a".into(), entry("a", "medium", 5, 0));
        state.entries.insert(
            "b".into(),
            entry("b", "medium", 5, QUEUE_ENTRY_TTL_MS),
        );
        state.tickets.insert(
            "c".into(),
            MatchTicket {
                room_id: "r".into(),
                issued_at: 0,
            },
        );

        state.prune_expired(QUEUE_ENTRY_TTL_MS + 1);
        assert!(!state.entries.contains_key("a"));
        assert!(state.entries.contains_key("b"));
        assert!(state.tickets.is_empty());
    }

    #[test]
    fn queue_state_deserializes_from_empty_object() {
        let state: QueueState = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(state.is_empty());
    }
}
