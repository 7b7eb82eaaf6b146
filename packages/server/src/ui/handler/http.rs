//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use tsugai_shared::time::unix_millis_to_rfc3339;

use crate::infrastructure::dto::http::ServerStatusDto;
use crate::ui::state::AppState;

/// Health check endpoint for the hosting platform.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Status summary: connected clients, wait-queue depth, active calls.
pub async fn server_status(State(state): State<Arc<AppState>>) -> Json<ServerStatusDto> {
    let stats = state.engine.stats().await;
    Json(ServerStatusDto {
        status: "ok".to_string(),
        message: "tsugai signaling server is running".to_string(),
        waiting: stats.waiting,
        active_calls: stats.active_calls,
        connected: stats.connected,
        oldest_waiting_since: stats.oldest_waiting_since.and_then(unix_millis_to_rfc3339),
    })
}
