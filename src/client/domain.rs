//! Domain logic for the client-side mirror.
//!
//! This module contains pure functions and the local queue mirror,
//! free of any transport concerns, making them easy to test.

use std::collections::HashMap;

use crate::protocol::{QueueMessage, RosterEntry};

use super::error::ClientError;

/// Display label for queue entries whose id no longer resolves to a
/// connected participant (e.g. the user disconnected after queueing).
pub const UNKNOWN_PLAYER: &str = "Unknown Player";

/// A user intent entered at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Join the speaking queue
    Join,
    /// Leave the speaking queue
    Leave,
    /// Dismiss the current speaker (GM only)
    Next,
    /// Clear the whole queue (GM only)
    Clear,
    /// Show the cached queue
    Queue,
    /// Show the cached roster
    Who,
    /// Show usage
    Help,
}

/// Parse a prompt line into a command. Unknown input yields `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "/join" => Some(Command::Join),
        "/leave" => Some(Command::Leave),
        "/next" => Some(Command::Next),
        "/clear" => Some(Command::Clear),
        "/queue" => Some(Command::Queue),
        "/who" => Some(Command::Who),
        "/help" => Some(Command::Help),
        _ => None,
    }
}

/// Whether a command may only be issued by a privileged (GM) session.
///
/// This is the dispatch-boundary gate; the server independently validates
/// privilege on receipt.
pub fn requires_privilege(command: Command) -> bool {
    matches!(command, Command::Next | Command::Clear)
}

/// The single command-to-action table: translate a command into the wire
/// message to send, tagged with the caller's own id where relevant.
/// Local-only commands (`/queue`, `/who`, `/help`) yield `None`.
pub fn command_to_message(command: Command, self_id: &str) -> Option<QueueMessage> {
    match command {
        Command::Join => Some(QueueMessage::AddPlayer {
            user_id: self_id.to_string(),
        }),
        Command::Leave => Some(QueueMessage::RemovePlayer {
            user_id: self_id.to_string(),
        }),
        Command::Next => Some(QueueMessage::RemoveCurrent),
        Command::Clear => Some(QueueMessage::ClearQueue),
        Command::Queue | Command::Who | Command::Help => None,
    }
}

/// One rendered queue position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSlot {
    pub user_id: String,
    pub name: String,
    /// True only for the head of the queue (the current speaker).
    pub speaking: bool,
}

/// The client-side mirror of the shared state.
///
/// Holds the last received snapshot and roster purely for rendering; both
/// are overwritten wholesale on receipt. The mirror never mutates the queue
/// itself; every mutation request goes to the server.
#[derive(Debug, Default)]
pub struct QueueView {
    queue: Vec<String>,
    roster: HashMap<String, RosterEntry>,
}

impl QueueView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached queue snapshot.
    pub fn apply_snapshot(&mut self, queue: Vec<String>) {
        self.queue = queue;
    }

    /// Replace the cached roster.
    pub fn apply_roster(&mut self, participants: Vec<RosterEntry>) {
        self.roster = participants
            .into_iter()
            .map(|entry| (entry.user_id.clone(), entry))
            .collect();
    }

    /// Resolve a participant id to its display name, falling back to
    /// [`UNKNOWN_PLAYER`] when the id is not in the roster.
    pub fn resolve_name(&self, user_id: &str) -> String {
        self.roster
            .get(user_id)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| UNKNOWN_PLAYER.to_string())
    }

    /// The render projection: index 0 is the current speaker, everyone
    /// else is waiting in turn order. Never fails, whatever the snapshot
    /// and roster contain.
    pub fn projection(&self) -> Vec<QueueSlot> {
        self.queue
            .iter()
            .enumerate()
            .map(|(index, user_id)| QueueSlot {
                user_id: user_id.clone(),
                name: self.resolve_name(user_id),
                speaking: index == 0,
            })
            .collect()
    }

    /// Roster entries in connection order (as broadcast by the server).
    pub fn roster(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self.roster.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        entries
    }
}

/// Check if the client should exit immediately based on the error type.
///
/// `true` if the error requires immediate exit (e.g., DuplicateClientId),
/// `false` otherwise.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::DuplicateClientId(_))
}

/// Check if the client should attempt to reconnect.
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    // Don't reconnect if the error requires immediate exit
    if should_exit_immediately(error) {
        return false;
    }

    // Don't reconnect if we've exhausted all attempts
    current_attempt < max_attempts
}
