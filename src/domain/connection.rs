//! Connection identity value object.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of one client session.
///
/// Generated when a socket completes its handshake and valid for the
/// lifetime of that socket. The identity is what travels through the shared
/// store and the pub/sub channels, so a connection can be addressed without
/// knowing which process holds its socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identity received over the wire (e.g. a `peer_id` field).
    ///
    /// Peer ids from clients are treated as opaque strings; whether they
    /// name an actual room member is checked against the store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_uuid_format() {
        // given / when:
        let id = ConnectionId::generate();

        // then: 8-4-4-4-12 hex groups
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(
            parts.iter().map(|p| p.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[test]
    fn test_generate_produces_unique_identities() {
        // given / when:
        let first = ConnectionId::generate();
        let second = ConnectionId::generate();

        // then:
        assert_ne!(first, second);
    }

    #[test]
    fn test_wire_identity_round_trips() {
        // given:
        let id = ConnectionId::new("50fa50ab-116c-4f83-b0a8-10f267aeab1b");

        // when / then:
        assert_eq!(id.as_str(), "50fa50ab-116c-4f83-b0a8-10f267aeab1b");
        assert_eq!(id.to_string(), id.into_string());
    }
}
