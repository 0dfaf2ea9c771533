//! Speaking queue client: a per-process mirror with a CLI.
//!
//! Connects to the speaking queue server, translates slash commands into
//! action messages, and renders every received queue snapshot.
//! Automatically reconnects on disconnection (max 5 attempts with 5 second
//! interval). Duplicate client_id connections are rejected by the server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin client -- --client-id alice
//! cargo run --bin client -- -c gm --name "Game Master" --gm
//! ```

use clap::Parser;

use speaking_queue_rs::common::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Speaking queue client with unique client ID", long_about = None)]
struct Args {
    /// Client ID, used as the participant id in the queue (must be unique)
    #[arg(short = 'c', long)]
    client_id: String,

    /// Display name shown to other participants (defaults to the client ID)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Connect with the privileged GM role (/next and /clear)
    #[arg(long)]
    gm: bool,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let display_name = args.name.unwrap_or_else(|| args.client_id.clone());

    if let Err(e) =
        speaking_queue_rs::client::run_client(args.url, args.client_id, display_name, args.gm).await
    {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
