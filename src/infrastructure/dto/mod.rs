//! Data Transfer Objects for the signaling protocol.
//!
//! The wire format is a single JSON object per frame with an `event` tag
//! field; `websocket` holds both directions plus the inbound codec.

pub mod websocket;
