//! Connection identity and per-connection state.

use std::fmt;

use uuid::Uuid;

use super::RoomId;

/// Opaque identifier of one live client connection.
///
/// Assigned server-side when the transport connection is accepted and
/// stable for the connection's lifetime. UUIDv4, so ids are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh connection id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id (used when decoding wire messages and in tests).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text label a client supplies at match-request time.
///
/// Absent or blank names fall back to "Anonymous".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    pub const ANONYMOUS: &'static str = "Anonymous";

    /// Build a display name from the optional client-supplied value.
    pub fn from_option(name: Option<String>) -> Self {
        match name {
            Some(name) if !name.trim().is_empty() => Self(name.trim().to_string()),
            _ => Self(Self::ANONYMOUS.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Matchmaking state of one connection.
///
/// Transitions: `Idle → Waiting → Paired → Idle` (on end-call or
/// disconnect). Malformed or duplicate requests are no-ops and never
/// leave this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerState {
    /// Connected, not seeking a partner.
    Idle,
    /// In the wait queue, seeking a partner.
    Waiting,
    /// Participant of the given room.
    Paired(RoomId),
}
