//! Server state shared across handlers.

use std::sync::Arc;

use crate::engine::MatchmakingEngine;

/// Shared application state
pub struct AppState {
    /// Matchmaking & relay engine (single synchronization domain)
    pub engine: Arc<MatchmakingEngine>,
}
