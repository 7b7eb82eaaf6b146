//! Concrete `MessagePusher` implementations.
//!
//! - `websocket`: pushes over the per-client WebSocket sender channels

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
