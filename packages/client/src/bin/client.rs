//! Terminal chat client for the campus lost-and-found portal.
//!
//! Restores the saved session (or asks for `/login`), connects to the chat
//! broker over STOMP/WebSocket, and reconnects automatically every 5 seconds
//! while the connection is down.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin campus-chat
//! cargo run --bin campus-chat -- --ws-url ws://chat.example.edu/ws --api-url https://chat.example.edu/lost-found
//! ```

use std::path::PathBuf;

use clap::Parser;

use campus_chat_client::{config::ClientConfig, ui::run_client};
use campus_chat_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "campus-chat")]
#[command(about = "Real-time chat client for the campus lost-and-found portal", long_about = None)]
struct Args {
    /// Portal REST API base URL
    #[arg(long, default_value = campus_chat_client::config::DEFAULT_API_URL)]
    api_url: String,

    /// Chat WebSocket endpoint
    #[arg(long, default_value = campus_chat_client::config::DEFAULT_WS_URL)]
    ws_url: String,

    /// Session file (defaults to the platform config directory)
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = ClientConfig {
        api_url: args.api_url,
        ws_url: args.ws_url,
        storage_path: args
            .storage
            .unwrap_or_else(ClientConfig::default_storage_path),
        ..ClientConfig::default()
    };

    if let Err(e) = run_client(config).await {
        tracing::error!("Client error: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
