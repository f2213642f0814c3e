//! Room identity value object.

use std::fmt::Write as _;

use sha2::{Digest, Sha512};

use super::SignalingError;

/// Identity of a room, derived from the user-supplied room name.
///
/// Rooms are keyed by the SHA-512 hex digest of the name, never the raw
/// name, so store keys cannot be enumerated from guessable room names and
/// cannot collide with other key namespaces. Two clients supplying the same
/// name always resolve to the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Derive the room identity from a user-supplied name.
    ///
    /// The name must be non-empty and at most 50 characters.
    pub fn from_name(name: &str) -> Result<Self, SignalingError> {
        if name.is_empty() {
            return Err(SignalingError::NoRoomIdGiven);
        }
        if name.chars().count() > 50 {
            return Err(SignalingError::RoomIdTooLong);
        }

        let digest = Sha512::digest(name.as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(Self(hex))
    }

    /// Wrap an already-hashed identity read back from the store.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines; the full digest is noise there.
    pub fn short(&self) -> &str {
        &self.0[..11.min(self.0.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_rejects_empty_name() {
        // given / when:
        let result = RoomId::from_name("");

        // then:
        assert!(matches!(result, Err(SignalingError::NoRoomIdGiven)));
    }

    #[test]
    fn test_from_name_rejects_names_longer_than_50_chars() {
        // given:
        let name = "c".repeat(51);

        // when:
        let result = RoomId::from_name(&name);

        // then:
        assert!(matches!(result, Err(SignalingError::RoomIdTooLong)));
    }

    #[test]
    fn test_from_name_accepts_50_char_name() {
        // given:
        let name = "c".repeat(50);

        // when / then:
        assert!(RoomId::from_name(&name).is_ok());
    }

    #[test]
    fn test_same_name_resolves_to_same_room() {
        // given / when:
        let first = RoomId::from_name("test_room").unwrap();
        let second = RoomId::from_name("test_room").unwrap();

        // then:
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_names_resolve_to_different_rooms() {
        // given / when:
        let first = RoomId::from_name("test_room").unwrap();
        let second = RoomId::from_name("test_room2").unwrap();

        // then:
        assert_ne!(first, second);
    }

    #[test]
    fn test_room_identity_is_sha512_hex_not_the_raw_name() {
        // given / when:
        let room = RoomId::from_name("test_room").unwrap();

        // then: 128 lowercase hex chars, name nowhere in it
        assert_eq!(room.as_str().len(), 128);
        assert!(room.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!room.as_str().contains("test_room"));
    }

    #[test]
    fn test_short_prefix_is_eleven_chars() {
        // given:
        let room = RoomId::from_name("test_room").unwrap();

        // when / then:
        assert_eq!(room.short().len(), 11);
        assert!(room.as_str().starts_with(room.short()));
    }
}
