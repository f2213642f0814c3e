//! Redis-backed room store.
//!
//! The shared store every server process coordinates through. Join and
//! leave are executed as server-side Lua scripts, so Redis itself is the
//! serialization point for room-mutating transitions: the script reads,
//! publishes and writes all affected keys in one indivisible step, no
//! matter how many processes race on the same room.
//!
//! Key schema (shared across all processes):
//!
//! - `store:room:members:<room>` — member set
//! - `store:room:peak_members:<room>` — peak concurrent member count
//! - `store:connection:room:<connection>` — current-room pointer
//! - `store:connection:joined:<connection>` — join timestamp (unix seconds)
//! - `store:connection:status:<connection>` — status hash
//! - `store:stats:room_peaks:<hour>` — histogram: peak size -> room count
//! - `store:stats:connection_time:<hour>` — histogram: minutes -> count
//! - `ps:connection:<connection>` — personal pub/sub channel
//!
//! Subscriptions run over a dedicated pub/sub connection (Redis requires
//! one); a router task forwards incoming payloads to the local subscriber
//! channels by stripping the channel prefix.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSubSink};
use redis::{AsyncCommands, Script};
use tokio::sync::{Mutex, mpsc};

use crate::common::time::hour_bucket;
use crate::domain::{ConnectionId, RoomId, RoomStore, Status, StoreError};

const CHANNEL_PREFIX: &str = "ps:connection:";

/// Atomic join: notify existing members, insert the joiner, raise the peak,
/// record join timestamp and room pointer. Returns the pre-insertion
/// member list.
///
/// KEYS: members, peak_members, connection:joined, connection:room
/// ARGV: connection id, new_peer payload, join timestamp, room id
const JOIN_ROOM_SCRIPT: &str = r#"
local members = redis.call('smembers', KEYS[1])
local count = 0
for _, peer_id in pairs(members) do
  redis.call('publish', "ps:connection:" .. peer_id, ARGV[2])
  count = count + 1
end
redis.call('sadd', KEYS[1], ARGV[1])
if count == 0 or tonumber(redis.call('get', KEYS[2])) <= count then
  redis.call('set', KEYS[2], count + 1)
end
redis.call('set', KEYS[3], ARGV[3])
redis.call('set', KEYS[4], ARGV[4])
return members
"#;

/// Atomic leave: bucket the membership duration, remove the member and its
/// connection keys, then either fold the peak into the room-peak histogram
/// and delete the room (last member) or notify the remaining members.
///
/// KEYS: members, peak_members, connection:joined, connection:room,
///       connection:status, stats:room_peaks:<hour>,
///       stats:connection_time:<hour>
/// ARGV: connection id, peer_left payload, leave timestamp
const LEAVE_ROOM_SCRIPT: &str = r#"
redis.call('hincrby', KEYS[7], math.floor((ARGV[3] - tonumber(redis.call('get', KEYS[3]))) / 60), 1)
redis.call('srem', KEYS[1], ARGV[1])
redis.call('del', KEYS[3])
redis.call('del', KEYS[4])
redis.call('del', KEYS[5])

if redis.call('scard', KEYS[1]) == 0 then
  redis.call('hincrby', KEYS[6], redis.call('get', KEYS[2]), 1)
  redis.call('del', KEYS[1])
  redis.call('del', KEYS[2])
else
  for _, peer_id in pairs(redis.call('smembers', KEYS[1])) do
    redis.call('publish', "ps:connection:" .. peer_id, ARGV[2])
  end
end
"#;

type Subscribers = Arc<Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>;

/// Redis-backed `RoomStore` implementation.
pub struct RedisRoomStore {
    connection: ConnectionManager,
    join_script: Script,
    leave_script: Script,
    subscriber_sink: Mutex<PubSubSink>,
    subscribers: Subscribers,
}

impl RedisRoomStore {
    /// Connect to Redis and start the pub/sub router task.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;

        let pubsub = client.get_async_pubsub().await?;
        let (subscriber_sink, mut stream) = pubsub.split();

        let subscribers: Subscribers = Arc::default();
        let router = subscribers.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let channel = message.get_channel_name().to_string();
                let Some(connection_id) = channel.strip_prefix(CHANNEL_PREFIX) else {
                    continue;
                };
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("dropping non-text payload on {}: {}", channel, e);
                        continue;
                    }
                };
                let subscribers = router.lock().await;
                if let Some(sender) = subscribers.get(&ConnectionId::new(connection_id)) {
                    let _ = sender.send(payload);
                }
            }
            tracing::error!("Redis subscription stream closed");
        });

        Ok(Self {
            connection,
            join_script: Script::new(JOIN_ROOM_SCRIPT),
            leave_script: Script::new(LEAVE_ROOM_SCRIPT),
            subscriber_sink: Mutex::new(subscriber_sink),
            subscribers,
        })
    }

    fn members_key(room: &RoomId) -> String {
        format!("store:room:members:{}", room.as_str())
    }

    fn peak_key(room: &RoomId) -> String {
        format!("store:room:peak_members:{}", room.as_str())
    }

    fn room_pointer_key(connection: &ConnectionId) -> String {
        format!("store:connection:room:{}", connection.as_str())
    }

    fn joined_key(connection: &ConnectionId) -> String {
        format!("store:connection:joined:{}", connection.as_str())
    }

    fn status_key(connection: &ConnectionId) -> String {
        format!("store:connection:status:{}", connection.as_str())
    }

    fn channel(connection: &ConnectionId) -> String {
        format!("{}{}", CHANNEL_PREFIX, connection.as_str())
    }
}

#[async_trait]
impl RoomStore for RedisRoomStore {
    async fn current_room(&self, connection: &ConnectionId) -> Result<Option<RoomId>, StoreError> {
        let mut conn = self.connection.clone();
        let room: Option<String> = conn.get(Self::room_pointer_key(connection)).await?;
        Ok(room.map(RoomId::from_hash))
    }

    async fn join_room(
        &self,
        connection: &ConnectionId,
        room: &RoomId,
        joined_at: i64,
        new_peer_payload: &str,
    ) -> Result<Vec<ConnectionId>, StoreError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = self
            .join_script
            .key(Self::members_key(room))
            .key(Self::peak_key(room))
            .key(Self::joined_key(connection))
            .key(Self::room_pointer_key(connection))
            .arg(connection.as_str())
            .arg(new_peer_payload)
            .arg(joined_at)
            .arg(room.as_str())
            .invoke_async(&mut conn)
            .await?;
        Ok(members.into_iter().map(ConnectionId::new).collect())
    }

    async fn leave_room(
        &self,
        connection: &ConnectionId,
        room: &RoomId,
        left_at: i64,
        peer_left_payload: &str,
    ) -> Result<(), StoreError> {
        let hour = hour_bucket(left_at);
        let mut conn = self.connection.clone();
        let _: () = self
            .leave_script
            .key(Self::members_key(room))
            .key(Self::peak_key(room))
            .key(Self::joined_key(connection))
            .key(Self::room_pointer_key(connection))
            .key(Self::status_key(connection))
            .key(format!("store:stats:room_peaks:{hour}"))
            .key(format!("store:stats:connection_time:{hour}"))
            .arg(connection.as_str())
            .arg(peer_left_payload)
            .arg(left_at)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn members(&self, room: &RoomId) -> Result<Vec<ConnectionId>, StoreError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn.smembers(Self::members_key(room)).await?;
        Ok(members.into_iter().map(ConnectionId::new).collect())
    }

    async fn is_member(
        &self,
        room: &RoomId,
        connection: &ConnectionId,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let is_member: bool = conn
            .sismember(Self::members_key(room), connection.as_str())
            .await?;
        Ok(is_member)
    }

    async fn status(&self, connection: &ConnectionId) -> Result<Status, StoreError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> = conn.hgetall(Self::status_key(connection)).await?;
        Ok(Status::from(fields))
    }

    async fn persist_status(
        &self,
        connection: &ConnectionId,
        status: &Status,
    ) -> Result<(), StoreError> {
        let mut fields: Vec<(&str, &str)> = Vec::new();
        if let Some(name) = &status.name {
            fields.push(("name", name));
        }
        if let Some(user_agent) = &status.user_agent {
            fields.push(("user_agent", user_agent));
        }
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let _: () = conn
            .hset_multiple(Self::status_key(connection), &fields)
            .await?;
        Ok(())
    }

    async fn publish(&self, connection: &ConnectionId, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.publish(Self::channel(connection), payload).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        connection: &ConnectionId,
    ) -> Result<mpsc::UnboundedReceiver<String>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut subscribers = self.subscribers.lock().await;
            subscribers.insert(connection.clone(), tx);
        }
        let mut sink = self.subscriber_sink.lock().await;
        if let Err(e) = sink.subscribe(Self::channel(connection)).await {
            let mut subscribers = self.subscribers.lock().await;
            subscribers.remove(connection);
            return Err(e.into());
        }
        Ok(rx)
    }

    async fn unsubscribe(&self, connection: &ConnectionId) {
        {
            let mut subscribers = self.subscribers.lock().await;
            subscribers.remove(connection);
        }
        let mut sink = self.subscriber_sink.lock().await;
        if let Err(e) = sink.unsubscribe(Self::channel(connection)).await {
            tracing::warn!("{} channel unsubscribe failed: {}", connection, e);
        }
    }
}
