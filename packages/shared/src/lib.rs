//! Shared utilities for the tsugai signaling server.

pub mod logger;
pub mod time;
