//! WebSocket client session management.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::protocol::QueueMessage;

use super::{
    domain::{Command, QueueView, command_to_message, parse_command, requires_privilege},
    error::ClientError,
    formatter::QueueFormatter,
    ui::redisplay_prompt,
};

/// Render the cached queue state to the terminal.
///
/// This is the render boundary: every received snapshot ends up here, and
/// the projection (head = speaking, rest waiting in order) is computed by
/// the view, not by the transport code.
fn render_queue(view: &QueueView, client_id: &str) {
    let slots = view.projection();
    print!("{}", QueueFormatter::format_queue(&slots));
    redisplay_prompt(client_id);
}

/// Run the WebSocket client session
pub async fn run_client_session(
    url: &str,
    client_id: &str,
    display_name: &str,
    is_gm: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Construct URL with identity as query parameters. Display names may
    // contain spaces; everything else is conservative enough to pass as-is.
    let role = if is_gm { "gm" } else { "player" };
    let url = format!(
        "{}?client_id={}&name={}&role={}",
        url,
        client_id,
        display_name.replace(' ', "%20"),
        role
    );

    let (ws_stream, response) = match connect_async(&url).await {
        Ok(result) => result,
        Err(e) => {
            // Check if it's an HTTP error response
            let error_msg = e.to_string();

            // Check for HTTP 409 Conflict
            if error_msg.contains("409") || error_msg.contains("Conflict") {
                return Err(Box::new(ClientError::DuplicateClientId(
                    client_id.to_string(),
                )));
            }

            return Err(Box::new(ClientError::ConnectionError(error_msg)));
        }
    };

    // Check HTTP status code from response
    if response.status().as_u16() == 409 {
        return Err(Box::new(ClientError::DuplicateClientId(
            client_id.to_string(),
        )));
    }

    tracing::info!("Connected to speaking queue server!");
    println!(
        "\nYou are '{}'{}. Type /help for commands. Press Ctrl+C to exit.\n",
        display_name,
        if is_gm { " (GM)" } else { "" }
    );

    let (mut write, mut read) = ws_stream.split();

    // The local mirror, shared between the read task (which overwrites it)
    // and the input loop (which renders it for /queue and /who).
    let view = Arc::new(Mutex::new(QueueView::new()));

    let client_id_for_read = client_id.to_string();
    let view_for_read = view.clone();

    // Spawn a task to handle incoming messages
    let mut read_task = tokio::spawn(async move {
        let mut connection_error = false;

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<QueueMessage>(&text) {
                    Ok(QueueMessage::UpdateQueue { queue }) => {
                        let mut view = view_for_read.lock().await;
                        view.apply_snapshot(queue);
                        render_queue(&view, &client_id_for_read);
                    }
                    Ok(QueueMessage::RosterUpdate { participants }) => {
                        tracing::debug!("Roster updated: {} participants", participants.len());
                        let mut view = view_for_read.lock().await;
                        view.apply_roster(participants);
                    }
                    Ok(QueueMessage::ActionRejected { reason }) => {
                        print!("{}", QueueFormatter::format_action_rejected(&reason));
                        redisplay_prompt(&client_id_for_read);
                    }
                    Ok(other) => {
                        // Action requests are server-bound; a mirror has no
                        // business applying them.
                        tracing::debug!("Ignoring server-bound message: {:?}", other);
                    }
                    Err(_) => {
                        let formatted = QueueFormatter::format_raw_message(&text);
                        print!("{}", formatted);
                        redisplay_prompt(&client_id_for_read);
                    }
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    connection_error = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    connection_error = true;
                    break;
                }
                _ => {}
            }
        }

        connection_error
    });

    // Clone client_id for the input loop
    let client_id = client_id.to_string();
    let client_id_for_prompt = client_id.clone();

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", client_id_for_prompt);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Spawn a task to translate prompt input into action messages
    let view_for_write = view.clone();
    let mut write_task = tokio::spawn(async move {
        let mut write_error = false;

        while let Some(line) = input_rx.recv().await {
            let Some(command) = parse_command(&line) else {
                println!("Unknown command. Type /help for a list of commands.");
                redisplay_prompt(&client_id);
                continue;
            };

            // Dispatch-boundary gate: privileged actions never leave a
            // non-GM session. The server validates again on receipt.
            if requires_privilege(command) && !is_gm {
                println!("Only the GM can use that command.");
                redisplay_prompt(&client_id);
                continue;
            }

            match command {
                Command::Queue => {
                    let view = view_for_write.lock().await;
                    render_queue(&view, &client_id);
                    continue;
                }
                Command::Who => {
                    let view = view_for_write.lock().await;
                    print!(
                        "{}",
                        QueueFormatter::format_roster(&view.roster(), &client_id)
                    );
                    redisplay_prompt(&client_id);
                    continue;
                }
                Command::Help => {
                    print!("{}", QueueFormatter::format_help());
                    redisplay_prompt(&client_id);
                    continue;
                }
                _ => {}
            }

            let Some(msg) = command_to_message(command, &client_id) else {
                continue;
            };

            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize action: {}", e);
                    continue;
                }
            };

            if let Err(e) = write.send(Message::Text(json.into())).await {
                tracing::warn!("Failed to send action: {}", e);
                write_error = true;
                break;
            }
        }

        write_error
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            let connection_error = read_result.unwrap_or(false);
            if connection_error {
                return Err(Box::new(ClientError::ConnectionError(
                    "Connection lost".to_string(),
                )));
            }
        }
        write_result = &mut write_task => {
            read_task.abort();
            let write_error = write_result.unwrap_or(false);
            if write_error {
                return Err(Box::new(ClientError::ConnectionError(
                    "Connection lost".to_string(),
                )));
            }
        }
    }

    Ok(())
}
