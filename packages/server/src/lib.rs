//! Matchmaking and WebRTC signaling server for tsugai.
//!
//! Pairs anonymous clients for 1:1 voice conversation and relays the
//! WebRTC negotiation (offer / answer / ICE candidates) plus text chat
//! between the two participants of a room. All state is memory-resident;
//! sessions are ephemeral and lost on restart.

// layers
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod ui;
