//! Room store implementations.
//!
//! `redis` is the production store: every process shares one Redis instance
//! and the atomic transitions run as server-side Lua scripts. `inmemory`
//! implements the same contract behind a single mutex for tests and
//! single-process deployments.

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryRoomStore;
pub use redis::RedisRoomStore;
