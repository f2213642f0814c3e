//! Infrastructure layer: concrete adapters behind the domain ports.

pub mod dto;
pub mod socket_registry;
pub mod store;

pub use socket_registry::{OutboundFrame, SocketRegistry};
pub use store::{InMemoryRoomStore, RedisRoomStore};
