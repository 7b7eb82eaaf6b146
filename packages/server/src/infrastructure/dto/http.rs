//! HTTP API response DTOs.

use serde::Serialize;

/// Response of the `/` status endpoint.
#[derive(Debug, Serialize)]
pub struct ServerStatusDto {
    pub status: String,
    pub message: String,
    /// Connections currently in the wait queue.
    pub waiting: usize,
    /// Active two-party calls (rooms).
    #[serde(rename = "activeCalls")]
    pub active_calls: usize,
    /// Currently connected clients.
    pub connected: usize,
    /// RFC 3339 enqueue time of the longest-waiting connection, if any.
    #[serde(rename = "oldestWaitingSince", skip_serializing_if = "Option::is_none")]
    pub oldest_waiting_since: Option<String>,
}
