//! HTTP and WebSocket endpoint handlers.

mod http;
mod websocket;

pub use http::{health_check, server_status};
pub use websocket::websocket_handler;
