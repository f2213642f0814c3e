//! WebSocket message DTOs and the inbound codec.
//!
//! Every frame in either direction is one JSON object carrying an `event`
//! field. Inbound frames decode through [`ClientMessage::parse`], which only
//! checks the envelope: each event has a fixed field schema, and absent
//! fields pass through as absent values — rejecting missing required values
//! (like an empty `room_id`) is the coordinator's job, so the error messages
//! stay consistent no matter whether a field was missing or empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{MessageParsingError, Status};

/// Event tag of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Info,
    JoinedRoom,
    NewPeer,
    PeerLeft,
    PeerUpdatedStatus,
    Shutdown,
    Error,
}

/// Reply to `info`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoMessage {
    pub event: EventType,
    pub protocol_version: String,
}

/// One pre-existing member in a `joined_room` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: String,
    /// Empty object when the peer never set a status.
    pub status: Status,
}

/// Reply to a successful `join_room`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JoinedRoomMessage {
    pub event: EventType,
    pub own_id: String,
    pub peers: Vec<PeerInfo>,
}

/// Published to every existing member when a connection joins their room.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewPeerMessage {
    pub event: EventType,
    pub peer_id: String,
    /// Present only when the joiner supplied a status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// Published to the remaining members when a connection leaves their room.
#[derive(Debug, Serialize, Deserialize)]
pub struct PeerLeftMessage {
    pub event: EventType,
    pub sender_id: String,
}

/// Published to every room member (sender included) on a status update.
#[derive(Debug, Serialize, Deserialize)]
pub struct PeerUpdatedStatusMessage {
    pub event: EventType,
    pub status: Status,
    pub sender_id: String,
}

/// Broadcast to all locally attached sockets before an administrative
/// shutdown.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShutdownMessage {
    pub event: EventType,
    pub seconds: u64,
}

/// Error reply for parsing and semantic failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub event: EventType,
    pub message: String,
}

/// A decoded inbound frame.
///
/// The variants mirror the fixed event set of the protocol; per-event fields
/// follow each event's schema with absent fields kept as `None`/`Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Info,
    JoinRoom {
        room_id: Option<String>,
        status: Option<Status>,
    },
    LeaveRoom,
    SendToPeer {
        peer_id: Option<String>,
        data: Value,
    },
    UpdateStatus {
        status: Option<Status>,
    },
}

impl ClientMessage {
    /// Decode one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, MessageParsingError> {
        let value: Value =
            serde_json::from_str(text).map_err(|_| MessageParsingError::InvalidMessage)?;
        let frame = value
            .as_object()
            .ok_or(MessageParsingError::NotAnObject)?;

        let event = match frame.get("event") {
            None | Some(Value::Null) => return Err(MessageParsingError::NoEventGiven),
            Some(event) => event
                .as_str()
                .ok_or(MessageParsingError::UnknownEvent)?,
        };

        match event {
            "info" => Ok(Self::Info),
            "join_room" => Ok(Self::JoinRoom {
                room_id: parse_string_field(frame.get("room_id")),
                status: parse_status_field(frame.get("status"))?,
            }),
            "leave_room" => Ok(Self::LeaveRoom),
            "send_to_peer" => Ok(Self::SendToPeer {
                peer_id: parse_string_field(frame.get("peer_id")),
                data: frame.get("data").cloned().unwrap_or(Value::Null),
            }),
            "update_status" => Ok(Self::UpdateStatus {
                status: parse_status_field(frame.get("status"))?,
            }),
            _ => Err(MessageParsingError::UnknownEvent),
        }
    }

    /// Event name for log lines.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::SendToPeer { .. } => "send_to_peer",
            Self::UpdateStatus { .. } => "update_status",
        }
    }
}

fn parse_string_field(field: Option<&Value>) -> Option<String> {
    field.and_then(Value::as_str).map(String::from)
}

fn parse_status_field(field: Option<&Value>) -> Result<Option<Status>, MessageParsingError> {
    match field {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| MessageParsingError::InvalidMessage),
    }
}
