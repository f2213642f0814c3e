//! UseCase: relay a signaling payload to one room peer.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{ConnectionId, RoomStore, SignalingError};

/// Payload events a client may relay to a peer.
pub const ALLOWED_RELAY_EVENTS: [&str; 3] = ["offer", "answer", "ice_candidate"];

/// Relays an opaque signaling payload to another member of the sender's
/// room. The server never inspects the payload beyond its `event` field.
pub struct SendToPeerUseCase {
    store: Arc<dyn RoomStore>,
}

impl SendToPeerUseCase {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Execute the relay.
    ///
    /// The payload must be a JSON object, the sender must be in a room, the
    /// target must currently be a member of that same room (re-checked
    /// here, never cached) and the payload's `event` must be whitelisted.
    /// The payload is published to the target's personal channel with the
    /// sender's id attached as `sender_id`; delivery is fire-and-forget.
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        peer_id: Option<String>,
        data: Value,
    ) -> Result<(), SignalingError> {
        let Value::Object(mut payload) = data else {
            return Err(SignalingError::RawData);
        };

        let Some(room) = self.store.current_room(connection_id).await? else {
            return Err(SignalingError::NotInRoom);
        };

        let peer = ConnectionId::new(peer_id.unwrap_or_default());
        if !self.store.is_member(&room, &peer).await? {
            return Err(SignalingError::UnknownPeer);
        }

        let allowed = payload
            .get("event")
            .and_then(Value::as_str)
            .is_some_and(|event| ALLOWED_RELAY_EVENTS.contains(&event));
        if !allowed {
            return Err(SignalingError::EventNotAllowed);
        }

        payload.insert(
            "sender_id".to_string(),
            Value::String(connection_id.to_string()),
        );
        let payload = serde_json::to_string(&Value::Object(payload)).unwrap();
        self.store.publish(&peer, &payload).await?;
        Ok(())
    }
}
