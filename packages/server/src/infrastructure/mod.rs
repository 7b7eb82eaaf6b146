//! Infrastructure layer: wire formats and outbound delivery.

pub mod dto;
pub mod message_pusher;
