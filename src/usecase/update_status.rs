//! UseCase: update a connection's status.

use std::sync::Arc;

use crate::domain::{ConnectionId, RoomStore, SignalingError, Status};
use crate::infrastructure::dto::websocket::{EventType, PeerUpdatedStatusMessage};

/// Validates, persists and announces a connection's status attributes.
pub struct UpdateStatusUseCase {
    store: Arc<dyn RoomStore>,
}

impl UpdateStatusUseCase {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Execute the update.
    ///
    /// A missing or empty status is ignored. Accepted fields are sanitized,
    /// persisted and broadcast as `peer_updated_status` to every member of
    /// the connection's room, including the sender. Without a current room
    /// the update succeeds silently after validation: a status is attached
    /// to a connection only while it is a room member, so there is nothing
    /// to persist it against and nobody to notify.
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        status: Option<Status>,
    ) -> Result<(), SignalingError> {
        let Some(input) = status else {
            return Ok(());
        };
        if input.is_empty() {
            return Ok(());
        }

        let accepted = input.validated()?;

        let Some(room) = self.store.current_room(connection_id).await? else {
            return Ok(());
        };
        self.store.persist_status(connection_id, &accepted).await?;

        let notification = PeerUpdatedStatusMessage {
            event: EventType::PeerUpdatedStatus,
            status: accepted,
            sender_id: connection_id.to_string(),
        };
        let payload = serde_json::to_string(&notification).unwrap();
        for member in self.store.members(&room).await? {
            self.store.publish(&member, &payload).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoomId;
    use crate::infrastructure::store::InMemoryRoomStore;
    use serde_json::{Value, json};

    fn create_usecase() -> (UpdateStatusUseCase, Arc<InMemoryRoomStore>) {
        let store = Arc::new(InMemoryRoomStore::new());
        let usecase = UpdateStatusUseCase::new(store.clone());
        (usecase, store)
    }

    fn named_status(name: &str) -> Option<Status> {
        Some(Status {
            name: Some(name.to_string()),
            user_agent: None,
        })
    }

    #[tokio::test]
    async fn test_missing_and_empty_status_are_ignored() {
        // given:
        let (usecase, store) = create_usecase();
        let connection_id = ConnectionId::generate();

        // when / then:
        assert!(usecase.execute(&connection_id, None).await.is_ok());
        assert!(
            usecase
                .execute(&connection_id, Some(Status::default()))
                .await
                .is_ok()
        );
        assert!(store.status(&connection_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_broadcasts_to_all_members_including_sender() {
        // given:
        let (usecase, store) = create_usecase();
        let room = RoomId::from_name("test_room").unwrap();
        let sender = ConnectionId::generate();
        let peer = ConnectionId::generate();
        let mut sender_rx = store.subscribe(&sender).await.unwrap();
        let mut peer_rx = store.subscribe(&peer).await.unwrap();
        store.join_room(&sender, &room, 1000, "{}").await.unwrap();
        store.join_room(&peer, &room, 1000, "{}").await.unwrap();
        sender_rx.recv().await; // peer's join notification

        // when:
        usecase
            .execute(&sender, named_status("John Doe"))
            .await
            .unwrap();

        // then: identical notification on both channels
        let expected = json!({
            "event": "peer_updated_status",
            "status": { "name": "John Doe" },
            "sender_id": sender.to_string()
        });
        let at_sender: Value = serde_json::from_str(&sender_rx.recv().await.unwrap()).unwrap();
        let at_peer: Value = serde_json::from_str(&peer_rx.recv().await.unwrap()).unwrap();
        assert_eq!(at_sender, expected);
        assert_eq!(at_peer, expected);
    }

    #[tokio::test]
    async fn test_update_persists_sanitized_name() {
        // given:
        let (usecase, store) = create_usecase();
        let room = RoomId::from_name("test_room").unwrap();
        let sender = ConnectionId::generate();
        let mut sender_rx = store.subscribe(&sender).await.unwrap();
        store.join_room(&sender, &room, 1000, "{}").await.unwrap();

        // when:
        usecase.execute(&sender, named_status("✈✈")).await.unwrap();

        // then: broadcast and store both carry the sanitized value
        let notification: Value = serde_json::from_str(&sender_rx.recv().await.unwrap()).unwrap();
        assert_eq!(notification["status"], json!({ "name": "**" }));
        assert_eq!(
            store.status(&sender).await.unwrap().name.as_deref(),
            Some("**")
        );
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_fields() {
        // given:
        let (usecase, _store) = create_usecase();
        let connection_id = ConnectionId::generate();

        // when / then:
        assert_eq!(
            usecase
                .execute(&connection_id, named_status(""))
                .await
                .unwrap_err(),
            SignalingError::BlankName
        );
        assert_eq!(
            usecase
                .execute(&connection_id, named_status(&"1".repeat(51)))
                .await
                .unwrap_err(),
            SignalingError::NameTooLong
        );
        assert_eq!(
            usecase
                .execute(
                    &connection_id,
                    Some(Status {
                        name: Some("123".to_string()),
                        user_agent: Some("firedonkey".to_string()),
                    })
                )
                .await
                .unwrap_err(),
            SignalingError::UnknownUserAgent
        );
    }

    #[tokio::test]
    async fn test_update_without_room_succeeds_silently() {
        // given:
        let (usecase, store) = create_usecase();
        let connection_id = ConnectionId::generate();

        // when:
        let result = usecase.execute(&connection_id, named_status("max")).await;

        // then: success, but nothing persisted or broadcast — a status is
        // attached to a connection only while it is a room member
        assert!(result.is_ok());
        assert!(store.status(&connection_id).await.unwrap().is_empty());
        assert_eq!(store.room_entry_count().await, 0);
    }
}
