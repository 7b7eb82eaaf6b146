//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::engine::MatchmakingEngine;

use super::{
    handler::{health_check, server_status, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Matchmaking & signaling server.
///
/// # Example
///
/// ```ignore
/// let engine = Arc::new(MatchmakingEngine::new(pusher));
/// let server = Server::new(engine);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// Matchmaking & relay engine
    engine: Arc<MatchmakingEngine>,
}

impl Server {
    pub fn new(engine: Arc<MatchmakingEngine>) -> Self {
        Self { engine }
    }

    /// Build the router. Exposed separately so tests can serve it on an
    /// ephemeral port.
    pub fn app(engine: Arc<MatchmakingEngine>) -> Router {
        let app_state = Arc::new(AppState { engine });

        Router::new()
            // WebSocket signaling endpoint
            .route("/ws", get(websocket_handler))
            // HTTP endpoints
            .route("/healthz", get(health_check))
            .route("/", get(server_status))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the signaling server.
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified
    /// address or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::app(self.engine);

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "Matchmaking & signaling server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        // Set up graceful shutdown signal handler
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
