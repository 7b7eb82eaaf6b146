//! Rooms: active two-party pairings.

use std::fmt;

use uuid::Uuid;

use super::{ConnectionId, DisplayName};

/// Unique identifier of a room.
///
/// UUIDv4 rather than a timestamp-derived string, so there is no
/// theoretical collision between rooms created in the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Generate a fresh room id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an id received over the wire.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One participant of a room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: DisplayName,
}

/// An active two-party session.
///
/// A room always has exactly two participants; both pairing records are
/// created and destroyed as a unit.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    participants: [Participant; 2],
}

impl Room {
    /// Create a room pairing `initiator` (the requester that found a
    /// waiting partner) with `partner`.
    pub fn create(initiator: Participant, partner: Participant) -> Self {
        Self {
            id: RoomId::generate(),
            participants: [initiator, partner],
        }
    }

    /// The other participant of the room, if `connection_id` is one of
    /// the two participants.
    pub fn partner_of(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        match &self.participants {
            [a, b] if a.connection_id == *connection_id => Some(b),
            [a, b] if b.connection_id == *connection_id => Some(a),
            _ => None,
        }
    }

    pub fn participants(&self) -> &[Participant; 2] {
        &self.participants
    }
}
