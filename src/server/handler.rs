//! WebSocket and HTTP handlers for the authoritative replica.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    common::time::now_unix_millis,
    protocol::QueueMessage,
};

use super::{
    domain::build_roster,
    state::{AppState, ClientInfo, ConnectQuery},
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let client_id = query.client_id.clone();

    if client_id.trim().is_empty() {
        tracing::warn!("Rejecting connection with empty client_id");
        return Err(StatusCode::BAD_REQUEST);
    }

    // Create a channel for this client to receive messages
    let (tx, rx) = mpsc::unbounded_channel();

    let connected_at = now_unix_millis();

    // Check if client_id is already connected and register the new client
    {
        let mut clients = state.connected_clients.lock().await;
        if clients.contains_key(&client_id) {
            tracing::warn!(
                "Client with ID '{}' is already connected. Rejecting connection.",
                client_id
            );
            return Err(StatusCode::CONFLICT);
        }
        let client_info = ClientInfo {
            sender: tx,
            name: query.display_name(),
            privileged: query.is_gm(),
            connected_at,
        };
        clients.insert(client_id.clone(), client_info);
    }

    tracing::info!(
        "Client '{}' connected and registered (privileged: {})",
        client_id,
        query.is_gm()
    );

    Ok(ws.on_upgrade(|socket| handle_socket(socket, state, client_id, rx)))
}

pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    client_id: String,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Send the current roster and queue snapshot to the newly connected
    // client, so late joiners converge without waiting for the next action.
    // The two locks are taken one at a time, never nested.
    {
        let roster_json = {
            let clients = state.connected_clients.lock().await;
            let roster_msg = QueueMessage::RosterUpdate {
                participants: build_roster(&clients),
            };
            serde_json::to_string(&roster_msg).expect("roster message should serialize")
        };
        if let Err(e) = sender.send(Message::Text(roster_json.into())).await {
            tracing::error!("Failed to send roster to '{}': {}", client_id, e);
            return;
        }

        let snapshot_json = {
            let queue = state.queue.lock().await;
            let snapshot_msg = QueueMessage::UpdateQueue {
                queue: queue.snapshot(),
            };
            serde_json::to_string(&snapshot_msg).expect("snapshot message should serialize")
        };
        if let Err(e) = sender.send(Message::Text(snapshot_json.into())).await {
            tracing::error!("Failed to send queue snapshot to '{}': {}", client_id, e);
            return;
        }
        tracing::info!("Sent roster and queue snapshot to '{}'", client_id);
    }

    // Broadcast the updated roster to all other clients
    {
        let clients = state.connected_clients.lock().await;
        let roster_msg = QueueMessage::RosterUpdate {
            participants: build_roster(&clients),
        };
        let roster_json =
            serde_json::to_string(&roster_msg).expect("roster message should serialize");
        for (id, client_info) in clients.iter() {
            if id != &client_id
                && client_info.sender.send(roster_json.clone()).is_err()
            {
                tracing::warn!("Failed to send roster update to client '{}'", id);
            }
        }
        tracing::info!("Broadcasted roster update for '{}'", client_id);
    }

    let client_id_clone = client_id.clone();
    let state_clone = state.clone();

    // Spawn a task to receive action messages from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received text from '{}': {}", client_id_clone, text);

                    // Unrecognized actions are tolerated for protocol
                    // evolution: log and ignore, never crash.
                    let action = match serde_json::from_str::<QueueMessage>(&text) {
                        Ok(action) => action,
                        Err(e) => {
                            tracing::warn!(
                                "Ignoring unrecognized message from '{}': {}",
                                client_id_clone,
                                e
                            );
                            continue;
                        }
                    };

                    apply_action(&state_clone, &client_id_clone, action).await;
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Client '{}' requested close", client_id_clone);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to forward broadcasts to this client's socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Remove the client from the registry and broadcast the updated roster.
    // The queue itself is left untouched: a speaker who disconnects keeps
    // their slot and renders as "Unknown Player" until removed or advanced.
    {
        let mut clients = state.connected_clients.lock().await;
        clients.remove(&client_id);
        tracing::info!(
            "Client '{}' disconnected and removed from registry",
            client_id
        );

        let roster_msg = QueueMessage::RosterUpdate {
            participants: build_roster(&clients),
        };
        let roster_json =
            serde_json::to_string(&roster_msg).expect("roster message should serialize");
        for (id, client_info) in clients.iter() {
            if client_info.sender.send(roster_json.clone()).is_err() {
                tracing::warn!("Failed to send roster update to client '{}'", id);
            }
        }
        tracing::info!("Broadcasted roster update after '{}' left", client_id);
    }
}

/// Apply one action from `sender_id` to the authoritative queue.
///
/// Every accepted action, whether or not it changed the queue, triggers a
/// broadcast of the resulting snapshot to every connected client including
/// the sender, so requesting clients always receive a fresh confirmation.
/// Privileged actions from non-privileged connections are refused: not
/// applied, not broadcast, and answered with an actionRejected notice.
async fn apply_action(state: &Arc<AppState>, sender_id: &str, action: QueueMessage) {
    let requires_privilege = matches!(
        action,
        QueueMessage::RemoveCurrent | QueueMessage::ClearQueue
    );

    if requires_privilege && !is_privileged(state, sender_id).await {
        tracing::warn!(
            "Refusing privileged action from non-privileged client '{}'",
            sender_id
        );
        reject_action(state, sender_id, "this action requires the GM role").await;
        return;
    }

    let snapshot = {
        let mut queue = state.queue.lock().await;
        match action {
            QueueMessage::AddPlayer { user_id } => {
                let changed = queue.join(&user_id);
                tracing::info!("'{}' joined the queue (changed: {})", user_id, changed);
            }
            QueueMessage::RemovePlayer { user_id } => {
                let changed = queue.leave(&user_id);
                tracing::info!("'{}' left the queue (changed: {})", user_id, changed);
            }
            QueueMessage::RemoveCurrent => {
                let dismissed = queue.advance();
                tracing::info!("Advanced past current speaker: {:?}", dismissed);
            }
            QueueMessage::ClearQueue => {
                queue.clear();
                tracing::info!("Queue cleared by '{}'", sender_id);
            }
            // Server-to-client message kinds are never accepted as actions.
            other => {
                tracing::warn!(
                    "Ignoring client-bound message kind sent by '{}': {:?}",
                    sender_id,
                    other
                );
                return;
            }
        }
        queue.snapshot()
    };

    broadcast_snapshot(state, snapshot).await;
}

/// Whether the given connection holds the GM role.
async fn is_privileged(state: &Arc<AppState>, client_id: &str) -> bool {
    let clients = state.connected_clients.lock().await;
    clients
        .get(client_id)
        .map(|info| info.privileged)
        .unwrap_or(false)
}

/// Send an actionRejected notice to a single client.
async fn reject_action(state: &Arc<AppState>, client_id: &str, reason: &str) {
    let notice = QueueMessage::ActionRejected {
        reason: reason.to_string(),
    };
    let json = serde_json::to_string(&notice).expect("rejection notice should serialize");

    let clients = state.connected_clients.lock().await;
    if let Some(info) = clients.get(client_id)
        && info.sender.send(json).is_err()
    {
        tracing::warn!("Failed to send rejection notice to client '{}'", client_id);
    }
}

/// Broadcast a queue snapshot to every connected client, sender included.
async fn broadcast_snapshot(state: &Arc<AppState>, snapshot: Vec<String>) {
    let msg = QueueMessage::UpdateQueue { queue: snapshot };
    let json = serde_json::to_string(&msg).expect("snapshot message should serialize");

    let clients = state.connected_clients.lock().await;
    for (id, client_info) in clients.iter() {
        if client_info.sender.send(json.clone()).is_err() {
            tracing::warn!("Failed to send queue snapshot to client '{}'", id);
        }
    }
    tracing::debug!("Broadcasted queue snapshot to {} clients", clients.len());
}

/// Queue state as reported by the HTTP inspection endpoint.
#[derive(Debug, Serialize)]
pub struct QueueStateResponse {
    pub session: String,
    pub queue: Vec<String>,
    pub current_speaker: Option<String>,
    pub connected_clients: usize,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Inspection endpoint exposing the current queue state (also used by tests)
pub async fn get_queue_state(State(state): State<Arc<AppState>>) -> Json<QueueStateResponse> {
    let (snapshot, current_speaker) = {
        let queue = state.queue.lock().await;
        (queue.snapshot(), queue.current_speaker().map(str::to_string))
    };
    let connected_clients = state.connected_clients.lock().await.len();

    Json(QueueStateResponse {
        session: state.session_id.clone(),
        queue: snapshot,
        current_speaker,
        connected_clients,
    })
}
