//! Domain model for matchmaking and signaling.
//!
//! Value objects, the wait queue, rooms and the connection registry.
//! Everything in this module is pure bookkeeping with no network
//! semantics; the engine composes these under a single lock.

mod connection;
mod pusher;
mod registry;
mod room;
mod wait_queue;

pub use connection::{ConnectionId, DisplayName, PeerState};
pub use pusher::{MessagePushError, MessagePusher, PusherChannel};
#[cfg(test)]
pub use pusher::MockMessagePusher;
pub use registry::ConnectionRegistry;
pub use room::{Participant, Room, RoomId};
pub use wait_queue::{WaitEntry, WaitQueue};
