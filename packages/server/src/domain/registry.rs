//! Connection registry: authoritative map from connection id to state.

use std::collections::HashMap;

use super::{ConnectionId, PeerState, RoomId};

/// Authoritative mapping from connection id to matchmaking state.
///
/// Pure bookkeeping with no network semantics. The engine mutates the
/// registry together with the wait queue and room map under one lock, so
/// the cross-structure invariants (a connection is never simultaneously
/// queued and paired) are never observable broken.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, PeerState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new transport connection with empty (idle) state.
    pub fn register(&mut self, connection_id: ConnectionId) {
        self.connections.insert(connection_id, PeerState::Idle);
    }

    /// Discard all state for a connection. Idempotent.
    ///
    /// Callers must remove the connection from the wait queue and tear
    /// down its pairing (if any) before unregistering; the engine's
    /// `disconnect` does both in the same lock scope.
    pub fn unregister(&mut self, connection_id: &ConnectionId) {
        self.connections.remove(connection_id);
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn is_waiting(&self, connection_id: &ConnectionId) -> bool {
        matches!(self.connections.get(connection_id), Some(PeerState::Waiting))
    }

    pub fn is_paired(&self, connection_id: &ConnectionId) -> bool {
        matches!(
            self.connections.get(connection_id),
            Some(PeerState::Paired(_))
        )
    }

    /// The room this connection is paired in, if any.
    pub fn paired_room(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        match self.connections.get(connection_id) {
            Some(PeerState::Paired(room_id)) => Some(room_id.clone()),
            _ => None,
        }
    }

    /// Transition to `Waiting`. No-op for unknown connections.
    pub fn mark_waiting(&mut self, connection_id: &ConnectionId) {
        if let Some(state) = self.connections.get_mut(connection_id) {
            *state = PeerState::Waiting;
        }
    }

    /// Transition to `Paired(room_id)`. No-op for unknown connections.
    pub fn mark_paired(&mut self, connection_id: &ConnectionId, room_id: RoomId) {
        if let Some(state) = self.connections.get_mut(connection_id) {
            *state = PeerState::Paired(room_id);
        }
    }

    /// Transition back to `Idle`. No-op for unknown connections.
    pub fn mark_idle(&mut self, connection_id: &ConnectionId) {
        if let Some(state) = self.connections.get_mut(connection_id) {
            *state = PeerState::Idle;
        }
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
