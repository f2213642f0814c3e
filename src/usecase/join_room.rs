//! UseCase: join a room.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::{ConnectionId, RoomId, RoomStore, SignalingError, Status};
use crate::infrastructure::dto::websocket::{
    EventType, JoinedRoomMessage, NewPeerMessage, PeerInfo,
};

/// Joins a connection to the room named by the client.
pub struct JoinRoomUseCase {
    store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
}

impl JoinRoomUseCase {
    pub fn new(store: Arc<dyn RoomStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Execute the join.
    ///
    /// Validates the room name, rejects a second join while a current-room
    /// pointer exists, then runs the atomic join transition: every existing
    /// member is notified with `new_peer` (carrying the supplied status, if
    /// any) and the joiner becomes a member with its join timestamp and room
    /// pointer set in the same step. A supplied status is validated and
    /// persisted only after the transition commits.
    ///
    /// The room-pointer check and the transition are two store round-trips;
    /// two join calls racing for the same connection can both pass the
    /// check. Known limitation, kept as observed behavior.
    ///
    /// Returns the `joined_room` reply for the dispatcher to send back: the
    /// connection's own id plus the pre-existing members with their
    /// persisted statuses. A member whose status vanishes between the
    /// transition and the lookup (it left concurrently) degrades to an
    /// empty status instead of failing the join.
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: Option<String>,
        status: Option<Status>,
    ) -> Result<JoinedRoomMessage, SignalingError> {
        let room = RoomId::from_name(room_id.as_deref().unwrap_or_default())?;

        if self.store.current_room(connection_id).await?.is_some() {
            return Err(SignalingError::AlreadyJoined);
        }

        tracing::info!("{} joins #{}...", connection_id, room.short());

        let new_peer = NewPeerMessage {
            event: EventType::NewPeer,
            peer_id: connection_id.to_string(),
            status: status.clone(),
        };
        let new_peer_payload = serde_json::to_string(&new_peer).unwrap();
        let joined_at = self.clock.now_unix();
        let members = self
            .store
            .join_room(connection_id, &room, joined_at, &new_peer_payload)
            .await?;

        if let Some(status) = &status {
            let accepted = status.validated()?;
            if !accepted.is_empty() {
                self.store.persist_status(connection_id, &accepted).await?;
            }
        }

        let mut peers = Vec::with_capacity(members.len());
        for peer_id in members {
            let status = self.store.status(&peer_id).await.unwrap_or_default();
            peers.push(PeerInfo {
                peer_id: peer_id.into_string(),
                status,
            });
        }

        Ok(JoinedRoomMessage {
            event: EventType::JoinedRoom,
            own_id: connection_id.to_string(),
            peers,
        })
    }
}
