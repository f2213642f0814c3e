//! Error types shared across the signaling core.
//!
//! Two client-visible kinds exist: parsing errors (malformed frames) and
//! semantic errors (business-rule violations). Both are answered with an
//! `error` event; the `Display` strings below are the exact messages sent
//! to clients. Store failures are a third kind that is fatal to the current
//! operation and only logged.

use thiserror::Error;

/// A business-rule violation tied to a specific connection.
#[derive(Debug, Error, PartialEq)]
pub enum SignalingError {
    #[error("no room id given")]
    NoRoomIdGiven,

    #[error("room id too long")]
    RoomIdTooLong,

    #[error("already joined another room")]
    AlreadyJoined,

    #[error("currently not in any room")]
    NotInRoom,

    #[error("unknown peer")]
    UnknownPeer,

    #[error("event not allowed")]
    EventNotAllowed,

    #[error("cannot send raw data")]
    RawData,

    #[error("blank name not allowed")]
    BlankName,

    #[error("name too long")]
    NameTooLong,

    #[error("unknown user agent")]
    UnknownUserAgent,

    /// Shared-store failure surfaced through an operation. Not a client
    /// mistake; logged instead of echoed back.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// A frame that could not be decoded into a known client event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageParsingError {
    #[error("invalid message")]
    InvalidMessage,

    #[error("invalid message: not an object")]
    NotAnObject,

    #[error("no event given")]
    NoEventGiven,

    #[error("unknown event")]
    UnknownEvent,
}

/// Failure of the shared room store or its pub/sub channel.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("subscription channel unavailable for {0}")]
    SubscriptionUnavailable(String),
}

impl PartialEq for StoreError {
    /// Store errors compare by kind only; the wrapped driver errors do not
    /// implement `PartialEq`.
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (StoreError::Redis(_), StoreError::Redis(_))
                | (
                    StoreError::SubscriptionUnavailable(_),
                    StoreError::SubscriptionUnavailable(_)
                )
        )
    }
}
