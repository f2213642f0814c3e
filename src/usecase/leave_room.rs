//! UseCase: leave the current room.

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::{ConnectionId, RoomStore, SignalingError};
use crate::infrastructure::dto::websocket::{EventType, PeerLeftMessage};

/// Removes a connection from its current room.
///
/// Runs on an explicit `leave_room` event and again when the socket closes,
/// so leaving without being in a room must stay a silent no-op — the two
/// paths can race on an unannounced disconnect.
pub struct LeaveRoomUseCase {
    store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
}

impl LeaveRoomUseCase {
    pub fn new(store: Arc<dyn RoomStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Execute the leave.
    ///
    /// The atomic leave transition folds the membership duration into the
    /// connection-time histogram, removes the member with all its
    /// room-scoped keys, and either closes the room (folding its peak into
    /// the room-peak histogram) or notifies the remaining members with
    /// `peer_left`. The leaver itself gets no acknowledgment.
    pub async fn execute(&self, connection_id: &ConnectionId) -> Result<(), SignalingError> {
        let Some(room) = self.store.current_room(connection_id).await? else {
            return Ok(());
        };

        tracing::info!("{} leaves #{}...", connection_id, room.short());

        let peer_left = PeerLeftMessage {
            event: EventType::PeerLeft,
            sender_id: connection_id.to_string(),
        };
        let peer_left_payload = serde_json::to_string(&peer_left).unwrap();
        let left_at = self.clock.now_unix();
        self.store
            .leave_room(connection_id, &room, left_at, &peer_left_payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::{FixedClock, hour_bucket};
    use crate::domain::RoomId;
    use crate::infrastructure::store::InMemoryRoomStore;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn create_usecase(now: i64) -> (LeaveRoomUseCase, Arc<InMemoryRoomStore>) {
        let store = Arc::new(InMemoryRoomStore::new());
        let usecase = LeaveRoomUseCase::new(store.clone(), Arc::new(FixedClock::new(now)));
        (usecase, store)
    }

    #[tokio::test]
    async fn test_leave_without_room_is_a_silent_no_op() {
        // given:
        let (usecase, store) = create_usecase(1000);
        let connection_id = ConnectionId::generate();

        // when:
        let result = usecase.execute(&connection_id).await;

        // then: no error, no histogram entry
        assert!(result.is_ok());
        assert!(store.room_peaks_snapshot().await.is_empty());
        assert!(store.connection_time_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_removes_membership_and_pointer() {
        // given:
        let (usecase, store) = create_usecase(1010);
        let room = RoomId::from_name("test_room").unwrap();
        let connection_id = ConnectionId::generate();
        store
            .join_room(&connection_id, &room, 1000, "{}")
            .await
            .unwrap();

        // when:
        usecase.execute(&connection_id).await.unwrap();

        // then:
        assert_eq!(store.current_room(&connection_id).await.unwrap(), None);
        assert_eq!(store.room_entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining_members_with_sender_id() {
        // given:
        let (usecase, store) = create_usecase(1010);
        let room = RoomId::from_name("test_room").unwrap();
        let leaver = ConnectionId::generate();
        let stayer = ConnectionId::generate();
        let mut stayer_rx = store.subscribe(&stayer).await.unwrap();
        store.join_room(&stayer, &room, 1000, "{}").await.unwrap();
        store.join_room(&leaver, &room, 1000, "{}").await.unwrap();
        stayer_rx.recv().await; // join notification

        // when:
        usecase.execute(&leaver).await.unwrap();

        // then:
        let notification: Value = serde_json::from_str(&stayer_rx.recv().await.unwrap()).unwrap();
        assert_eq!(
            notification,
            json!({ "event": "peer_left", "sender_id": leaver.to_string() })
        );
    }

    #[tokio::test]
    async fn test_last_leave_folds_peak_into_histogram() {
        // given:
        let left_at = 7200;
        let (usecase, store) = create_usecase(left_at);
        let room = RoomId::from_name("test_room").unwrap();
        let connection_id = ConnectionId::generate();
        store
            .join_room(&connection_id, &room, 7000, "{}")
            .await
            .unwrap();

        // when:
        usecase.execute(&connection_id).await.unwrap();

        // then: {"1": 1} under the leave hour
        let peaks = store.room_peaks_snapshot().await;
        assert_eq!(peaks[&hour_bucket(left_at)], HashMap::from([(1, 1)]));
    }

    #[tokio::test]
    async fn test_leave_buckets_connection_time_by_own_join_timestamp() {
        // given: joined 61 minutes before leaving
        let joined_at = 10_000;
        let left_at = joined_at + 61 * 60;
        let (usecase, store) = create_usecase(left_at);
        let room = RoomId::from_name("test_room").unwrap();
        let connection_id = ConnectionId::generate();
        store
            .join_room(&connection_id, &room, joined_at, "{}")
            .await
            .unwrap();

        // when:
        usecase.execute(&connection_id).await.unwrap();

        // then:
        let times = store.connection_time_snapshot().await;
        assert_eq!(times[&hour_bucket(left_at)], HashMap::from([(61, 1)]));
    }

    #[tokio::test]
    async fn test_leave_is_idempotent_for_double_invocation() {
        // given: close-path leave racing an explicit leave_room
        let (usecase, store) = create_usecase(1010);
        let room = RoomId::from_name("test_room").unwrap();
        let connection_id = ConnectionId::generate();
        store
            .join_room(&connection_id, &room, 1000, "{}")
            .await
            .unwrap();

        // when:
        usecase.execute(&connection_id).await.unwrap();
        let second = usecase.execute(&connection_id).await;

        // then: second invocation is a no-op
        assert!(second.is_ok());
        let peaks = store.room_peaks_snapshot().await;
        assert_eq!(peaks[&hour_bucket(1010)], HashMap::from([(1, 1)]));
    }
}
