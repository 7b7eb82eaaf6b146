//! Outbound message delivery abstraction.
//!
//! The engine emits events through this trait without knowing about the
//! WebSocket layer. The concrete implementation lives in
//! `infrastructure::message_pusher`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::ConnectionId;

/// Channel used to push serialized messages to one client.
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// Delivery of serialized events to connected clients.
///
/// Sends are fire-and-forget from the engine's point of view: a failed
/// push is logged and never stalls matchmaking for other connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register the sender channel for a newly connected client.
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// Remove the sender channel for a disconnected client.
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// Push a serialized message to one client.
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;
}
