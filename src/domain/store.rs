//! Store trait definition.
//!
//! The interface the coordinator operations require from the shared room
//! store. The usecase layer depends on this trait and not on the concrete
//! Redis or in-memory implementations in the infrastructure layer
//! (dependency inversion).
//!
//! The join and leave transitions are multi-key read-modify-writes that the
//! implementation must execute atomically: no other join or leave touching
//! the same room keys may interleave. Notification payloads are handed in as
//! pre-rendered strings so the transition itself can publish them to the
//! affected members' personal channels without knowing about message shapes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, RoomId, Status, StoreError};

/// The shared room store holding membership sets, per-connection room
/// pointers, statuses, join timestamps, peak counters and the statistics
/// histograms, plus the per-connection pub/sub channels.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// The room the connection is currently joined to, if any.
    async fn current_room(&self, connection: &ConnectionId) -> Result<Option<RoomId>, StoreError>;

    /// Atomic join transition.
    ///
    /// Publishes `new_peer_payload` to every existing member's channel,
    /// inserts the connection into the member set, raises the room's peak
    /// counter if exceeded, records `joined_at` as the join timestamp and
    /// sets the connection's current-room pointer. Returns the member list
    /// as it was before the insertion.
    async fn join_room(
        &self,
        connection: &ConnectionId,
        room: &RoomId,
        joined_at: i64,
        new_peer_payload: &str,
    ) -> Result<Vec<ConnectionId>, StoreError>;

    /// Atomic leave transition.
    ///
    /// Buckets the membership duration into the connection-time histogram,
    /// removes the connection from the member set and deletes its room
    /// pointer, join timestamp and status. If the room is now empty its peak
    /// counter is folded into the room-peak histogram and the room keys are
    /// deleted; otherwise `peer_left_payload` is published to every
    /// remaining member's channel. Both histograms are keyed by the hour
    /// bucket of `left_at`.
    async fn leave_room(
        &self,
        connection: &ConnectionId,
        room: &RoomId,
        left_at: i64,
        peer_left_payload: &str,
    ) -> Result<(), StoreError>;

    /// Current members of a room.
    async fn members(&self, room: &RoomId) -> Result<Vec<ConnectionId>, StoreError>;

    /// Whether the connection is currently a member of the room.
    async fn is_member(&self, room: &RoomId, connection: &ConnectionId)
    -> Result<bool, StoreError>;

    /// The connection's persisted status; empty if none is stored.
    async fn status(&self, connection: &ConnectionId) -> Result<Status, StoreError>;

    /// Persist the supplied status fields. Absent fields are left untouched.
    async fn persist_status(
        &self,
        connection: &ConnectionId,
        status: &Status,
    ) -> Result<(), StoreError>;

    /// Publish a payload to the connection's personal channel.
    ///
    /// Fire-and-forget: delivering to a connection nobody subscribed to is
    /// not an error.
    async fn publish(&self, connection: &ConnectionId, payload: &str) -> Result<(), StoreError>;

    /// Subscribe the connection's personal channel.
    ///
    /// Payloads published to the channel (from this or any other process)
    /// arrive on the returned receiver, in publish order per channel.
    async fn subscribe(
        &self,
        connection: &ConnectionId,
    ) -> Result<mpsc::UnboundedReceiver<String>, StoreError>;

    /// Drop the connection's channel subscription.
    async fn unsubscribe(&self, connection: &ConnectionId);
}
