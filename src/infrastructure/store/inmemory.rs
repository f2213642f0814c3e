//! In-memory room store.
//!
//! Implements the `RoomStore` contract for tests and single-process
//! deployments. One mutex guards the whole state, which makes every
//! multi-key transition atomic the same way the Redis scripts are: a join
//! or leave runs to completion before any other transition can observe the
//! keys it touches. The structure mirrors the shared-store schema
//! one-to-one (member sets, peak counters, room pointers, join timestamps,
//! statuses, hour-bucketed histograms, per-connection channels).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::common::time::{duration_minutes, hour_bucket};
use crate::domain::{ConnectionId, RoomId, RoomStore, Status, StoreError};

#[derive(Default)]
struct InnerState {
    members: HashMap<RoomId, HashSet<ConnectionId>>,
    peaks: HashMap<RoomId, u64>,
    current_rooms: HashMap<ConnectionId, RoomId>,
    joined_at: HashMap<ConnectionId, i64>,
    statuses: HashMap<ConnectionId, Status>,
    /// hour bucket -> peak size -> number of rooms that closed with it
    room_peaks: HashMap<i64, HashMap<u64, u64>>,
    /// hour bucket -> whole minutes -> number of connections
    connection_time: HashMap<i64, HashMap<i64, u64>>,
    subscribers: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
}

impl InnerState {
    /// Deliver a payload to a subscribed connection, if any.
    ///
    /// Publishing to a channel nobody subscribed is a no-op, matching
    /// pub/sub semantics.
    fn publish(&self, connection: &ConnectionId, payload: &str) {
        if let Some(sender) = self.subscribers.get(connection) {
            if sender.send(payload.to_string()).is_err() {
                tracing::debug!("{} subscriber gone, dropping payload", connection);
            }
        }
    }
}

/// In-memory `RoomStore` implementation.
#[derive(Default)]
pub struct InMemoryRoomStore {
    inner: Mutex<InnerState>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the room-peak histogram (hour bucket -> peak -> count).
    pub async fn room_peaks_snapshot(&self) -> HashMap<i64, HashMap<u64, u64>> {
        self.inner.lock().await.room_peaks.clone()
    }

    /// Snapshot of the connection-time histogram
    /// (hour bucket -> minutes -> count).
    pub async fn connection_time_snapshot(&self) -> HashMap<i64, HashMap<i64, u64>> {
        self.inner.lock().await.connection_time.clone()
    }

    /// Number of room-scoped entries still held.
    ///
    /// Zero means no membership sets, peak counters, room pointers, join
    /// timestamps or statuses remain — connections and deserted rooms leave
    /// no traces.
    pub async fn room_entry_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.members.len()
            + inner.peaks.len()
            + inner.current_rooms.len()
            + inner.joined_at.len()
            + inner.statuses.len()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn current_room(&self, connection: &ConnectionId) -> Result<Option<RoomId>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.current_rooms.get(connection).cloned())
    }

    async fn join_room(
        &self,
        connection: &ConnectionId,
        room: &RoomId,
        joined_at: i64,
        new_peer_payload: &str,
    ) -> Result<Vec<ConnectionId>, StoreError> {
        let mut inner = self.inner.lock().await;

        let existing: Vec<ConnectionId> = inner
            .members
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        for member in &existing {
            inner.publish(member, new_peer_payload);
        }

        let count = existing.len() as u64;
        inner
            .members
            .entry(room.clone())
            .or_default()
            .insert(connection.clone());
        let peak = inner.peaks.entry(room.clone()).or_insert(0);
        if count == 0 || *peak <= count {
            *peak = count + 1;
        }
        inner.joined_at.insert(connection.clone(), joined_at);
        inner
            .current_rooms
            .insert(connection.clone(), room.clone());

        Ok(existing)
    }

    async fn leave_room(
        &self,
        connection: &ConnectionId,
        room: &RoomId,
        left_at: i64,
        peer_left_payload: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let hour = hour_bucket(left_at);

        let joined_at = inner.joined_at.remove(connection).unwrap_or(left_at);
        let minutes = duration_minutes(joined_at, left_at);
        *inner
            .connection_time
            .entry(hour)
            .or_default()
            .entry(minutes)
            .or_insert(0) += 1;

        if let Some(members) = inner.members.get_mut(room) {
            members.remove(connection);
        }
        inner.current_rooms.remove(connection);
        inner.statuses.remove(connection);

        let deserted = inner
            .members
            .get(room)
            .is_none_or(|members| members.is_empty());
        if deserted {
            let peak = inner.peaks.remove(room).unwrap_or(0);
            *inner
                .room_peaks
                .entry(hour)
                .or_default()
                .entry(peak)
                .or_insert(0) += 1;
            inner.members.remove(room);
        } else {
            let remaining: Vec<ConnectionId> = inner
                .members
                .get(room)
                .map(|members| members.iter().cloned().collect())
                .unwrap_or_default();
            for member in &remaining {
                inner.publish(member, peer_left_payload);
            }
        }

        Ok(())
    }

    async fn members(&self, room: &RoomId) -> Result<Vec<ConnectionId>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .members
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn is_member(
        &self,
        room: &RoomId,
        connection: &ConnectionId,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .members
            .get(room)
            .is_some_and(|members| members.contains(connection)))
    }

    async fn status(&self, connection: &ConnectionId) -> Result<Status, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.statuses.get(connection).cloned().unwrap_or_default())
    }

    async fn persist_status(
        &self,
        connection: &ConnectionId,
        status: &Status,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.statuses.entry(connection.clone()).or_default();
        if let Some(name) = &status.name {
            stored.name = Some(name.clone());
        }
        if let Some(user_agent) = &status.user_agent {
            stored.user_agent = Some(user_agent.clone());
        }
        Ok(())
    }

    async fn publish(&self, connection: &ConnectionId, payload: &str) -> Result<(), StoreError> {
        let inner = self.inner.lock().await;
        inner.publish(connection, payload);
        Ok(())
    }

    async fn subscribe(
        &self,
        connection: &ConnectionId,
    ) -> Result<mpsc::UnboundedReceiver<String>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        inner.subscribers.insert(connection.clone(), tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, connection: &ConnectionId) {
        let mut inner = self.inner.lock().await;
        inner.subscribers.remove(connection);
    }
}
