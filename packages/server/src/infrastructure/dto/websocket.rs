//! WebSocket signaling events.
//!
//! All frames are JSON objects tagged by a kebab-case `type` field with
//! camelCase payload fields. Negotiation payloads (offer / answer / ICE
//! candidate) are opaque to the server and carried as raw
//! `serde_json::Value`s; the relay never interprets them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound event: client → engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Request a partner. `name` labels the sender for its future peer.
    FindMatch {
        #[serde(default)]
        name: Option<String>,
    },
    /// Leave the wait queue.
    CancelMatch,
    /// WebRTC session offer, forwarded verbatim to the room partner.
    Offer {
        offer: Value,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// WebRTC session answer.
    Answer {
        answer: Value,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// ICE candidate.
    IceCandidate {
        candidate: Value,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// In-call text chat.
    ChatMessage {
        message: String,
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "senderName", default)]
        sender_name: Option<String>,
    },
    /// Hang up the current call.
    EndCall,
}

/// Outbound event: engine → client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once after the transport connection is accepted, carrying the
    /// server-assigned connection id.
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    /// Acknowledgment that the client was placed in the wait queue.
    Waiting,
    /// A partner was found.
    Matched {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "partnerId")]
        partner_id: String,
        #[serde(rename = "partnerName")]
        partner_name: String,
        /// Exactly one side of a room is the initiator: the requester of
        /// the successful match. It originates the media negotiation.
        #[serde(rename = "isInitiator")]
        is_initiator: bool,
    },
    Offer {
        offer: Value,
        from: String,
    },
    Answer {
        answer: Value,
        from: String,
    },
    IceCandidate {
        candidate: Value,
        from: String,
    },
    ChatMessage {
        message: String,
        #[serde(rename = "senderName")]
        sender_name: String,
        #[serde(rename = "senderId")]
        sender_id: String,
        /// Server-assigned Unix timestamp in milliseconds.
        timestamp: i64,
    },
    /// The partner ended the call or disconnected.
    CallEnded,
}
