//! Domain logic for the authoritative speaking queue.
//!
//! This module contains the queue state machine and pure helper functions,
//! free of any transport concerns, making them easy to test.

use std::collections::HashMap;

use crate::protocol::RosterEntry;

use super::state::ClientInfo;

/// The canonical speaking queue: an ordered list of participant ids with
/// at most one occurrence per id. The head of the queue (index 0) is the
/// current speaker.
///
/// All four operations are total: they never fail, for any queue state and
/// any participant id. The server serializes mutations by holding the state
/// lock across each apply, so no interleaving concerns arise here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakingQueue {
    entries: Vec<String>,
}

impl SpeakingQueue {
    /// Create an empty queue (the initial state of every session).
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append `user_id` to the end of the queue unless already present.
    ///
    /// Re-joining while already queued is a no-op, not an error.
    /// Returns `true` if the queue changed.
    pub fn join(&mut self, user_id: &str) -> bool {
        if self.entries.iter().any(|id| id == user_id) {
            return false;
        }
        self.entries.push(user_id.to_string());
        true
    }

    /// Remove `user_id` from the queue if present.
    ///
    /// Leaving a queue you are not in is a no-op, not an error.
    /// Returns `true` if the queue changed.
    pub fn leave(&mut self, user_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|id| id != user_id);
        self.entries.len() != before
    }

    /// Dismiss the current speaker (remove the head of the queue).
    ///
    /// Returns the dismissed id, or `None` if the queue was empty.
    pub fn advance(&mut self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.remove(0))
    }

    /// Unconditionally empty the queue.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The participant currently speaking, if any.
    pub fn current_speaker(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    /// A full snapshot of the queue in turn order. This is the only form of
    /// state ever transmitted to mirrors.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the connected-participant roster from the client registry.
///
/// Sorted by connection time (ties broken by user id) so every client
/// renders the same roster order.
pub fn build_roster(connected_clients: &HashMap<String, ClientInfo>) -> Vec<RosterEntry> {
    let mut roster: Vec<RosterEntry> = connected_clients
        .iter()
        .map(|(user_id, info)| RosterEntry {
            user_id: user_id.clone(),
            name: info.name.clone(),
            is_gm: info.privileged,
            connected_at: info.connected_at,
        })
        .collect();

    roster.sort_by(|a, b| {
        a.connected_at
            .cmp(&b.connected_at)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    roster
}
