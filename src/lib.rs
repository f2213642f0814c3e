//! Distributed signaling relay for palava WebRTC sessions.
//!
//! Clients connect over WebSocket, join named rooms and exchange small
//! signaling payloads (offers, answers, ICE candidates) with the other room
//! members. The authoritative room state lives in a shared store, not in the
//! process that accepted the socket, so any number of server processes can
//! run behind a load balancer and still reach each connection through its
//! personal pub/sub channel.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// shared library
pub mod common;

/// Version of the signaling protocol spoken over the wire.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// WebSocket subprotocol identifier clients must offer during the handshake.
pub const PROTOCOL_IDENTIFIER: &str = "palava.1.0";

/// Close code sent on protocol or handshake violations.
pub const CLOSE_CODE_PROTOCOL_ERROR: u16 = 4242;

/// Close code sent when the server shuts down administratively.
pub const CLOSE_CODE_SHUTDOWN: u16 = 4200;
