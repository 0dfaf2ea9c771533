//! Wire protocol for the speaking queue.
//!
//! Every payload is a JSON object with a string `action` discriminator.
//! A single tagged enum keeps dispatch in one `match` instead of scattering
//! per-message parsing across handlers.

use serde::{Deserialize, Serialize};

/// A message on the speaking queue channel.
///
/// Client → server: `AddPlayer`, `RemovePlayer`, `RemoveCurrent`, `ClearQueue`.
/// Server → client: `UpdateQueue`, `RosterUpdate`, `ActionRejected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum QueueMessage {
    /// Request to append a participant to the end of the queue.
    #[serde(rename = "addPlayer")]
    AddPlayer {
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Request to remove a participant from the queue.
    #[serde(rename = "removePlayer")]
    RemovePlayer {
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Request to dismiss the current speaker (head of the queue). Privileged.
    #[serde(rename = "removeCurrent")]
    RemoveCurrent,

    /// Request to empty the queue. Privileged.
    #[serde(rename = "clearQueue")]
    ClearQueue,

    /// Full queue snapshot, broadcast after every applied action.
    /// Snapshots replace the mirror's cache wholesale; no deltas are sent.
    #[serde(rename = "updateQueue")]
    UpdateQueue { queue: Vec<String> },

    /// Full roster of connected participants, pushed on connect and
    /// broadcast whenever a connection comes or goes.
    #[serde(rename = "rosterUpdate")]
    RosterUpdate { participants: Vec<RosterEntry> },

    /// Sent only to the requester when the server refuses an action
    /// (e.g. a privileged action from a non-GM connection).
    #[serde(rename = "actionRejected")]
    ActionRejected { reason: String },
}

/// One connected participant, as seen by the identity boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(rename = "isGm")]
    pub is_gm: bool,
    /// Unix timestamp in milliseconds when the connection was established.
    #[serde(rename = "connectedAt")]
    pub connected_at: i64,
}
