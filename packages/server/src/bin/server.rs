//! Matchmaking & WebRTC signaling server for tsugai.
//!
//! Pairs anonymous clients two at a time and relays offer / answer / ICE
//! candidate / chat frames between room partners.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsugai-server
//! cargo run --bin tsugai-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;

use tsugai_server::{
    engine::MatchmakingEngine, infrastructure::message_pusher::WebSocketMessagePusher, ui::Server,
};
use tsugai_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "tsugai-server")]
#[command(about = "Matchmaking and WebRTC signaling server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. MessagePusher
    // 2. Engine
    // 3. Server

    let message_pusher = Arc::new(WebSocketMessagePusher::new());
    let engine = Arc::new(MatchmakingEngine::new(message_pusher));

    let server = Server::new(engine);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
