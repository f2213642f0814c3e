//! Per-connection status attributes and their validation rules.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::SignalingError;

/// User agents a client may announce.
pub const ALLOWED_USER_AGENTS: [&str; 3] = ["firefox", "chrome", "unknown"];

/// Optional attributes a connection may attach to itself while it is a room
/// member: a display name and a coarse user-agent tag.
///
/// Serializes to a plain JSON object with absent fields omitted, which is
/// exactly the shape used in `joined_room`, `new_peer` and
/// `peer_updated_status` payloads (an empty status becomes `{}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Status {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.user_agent.is_none()
    }

    /// Validate the supplied fields and return the sanitized status that may
    /// be persisted and broadcast.
    ///
    /// * `name` must not be blank and must fit in 50 characters; a name
    ///   containing any non-ASCII character is replaced by `*` repeated to
    ///   the same character count (silent, length-preserving).
    /// * `user_agent` must be one of [`ALLOWED_USER_AGENTS`].
    pub fn validated(&self) -> Result<Status, SignalingError> {
        let mut accepted = Status::default();

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(SignalingError::BlankName);
            }
            if name.chars().count() > 50 {
                return Err(SignalingError::NameTooLong);
            }
            let name = if name.is_ascii() {
                name.clone()
            } else {
                "*".repeat(name.chars().count())
            };
            accepted.name = Some(name);
        }

        if let Some(user_agent) = &self.user_agent {
            if !ALLOWED_USER_AGENTS.contains(&user_agent.as_str()) {
                return Err(SignalingError::UnknownUserAgent);
            }
            accepted.user_agent = Some(user_agent.clone());
        }

        Ok(accepted)
    }
}

impl From<HashMap<String, String>> for Status {
    /// Rebuild a status from the field map persisted in the store.
    fn from(mut fields: HashMap<String, String>) -> Self {
        Self {
            name: fields.remove("name"),
            user_agent: fields.remove("user_agent"),
        }
    }
}
