//! Data Transfer Objects, organized by protocol:
//! - `websocket`: signaling events exchanged over the WebSocket channel
//! - `http`: HTTP API response DTOs

pub mod http;
pub mod websocket;
