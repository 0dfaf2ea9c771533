//! Server state and connection management.

use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};

use super::domain::SpeakingQueue;

/// Query parameters for WebSocket connection.
///
/// `client_id` doubles as the participant id in the queue. `role=gm` marks
/// the connection privileged; `name` is the display name shown to other
/// clients (defaults to the client_id).
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub client_id: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl ConnectQuery {
    /// Whether this connection claims the privileged (GM) role.
    pub fn is_gm(&self) -> bool {
        self.role.as_deref() == Some("gm")
    }

    /// Display name, falling back to the client_id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.client_id.clone())
    }
}

/// Client connection information
pub struct ClientInfo {
    /// Message sender channel
    pub sender: mpsc::UnboundedSender<String>,
    /// Display name supplied at connect time
    pub name: String,
    /// Whether this connection may issue removeCurrent/clearQueue
    pub privileged: bool,
    /// Unix timestamp when connected (UTC, milliseconds)
    pub connected_at: i64,
}

/// Shared application state
pub struct AppState {
    /// Session identifier, generated once at server startup
    pub session_id: String,
    /// Map of client_id to their connection info
    pub connected_clients: Mutex<HashMap<String, ClientInfo>>,
    /// The authoritative speaking queue; mutated only while this lock is held
    pub queue: Mutex<SpeakingQueue>,
}

impl AppState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            connected_clients: Mutex::new(HashMap::new()),
            queue: Mutex::new(SpeakingQueue::new()),
        }
    }
}
