//! Match and relay errors.
//!
//! Every variant is a user-input error scoped to one connection. The service
//! reports it back to the offending sender as an `error_message` whose text
//! is the variant's `Display`; nothing here is fatal or retryable.

use thiserror::Error;

use crate::role::Role;

/// Errors raised while handling a client event.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MatchError {
    /// `select_role` named something other than `confessor` or `listener`.
    #[error("Invalid role selected.")]
    InvalidRole(String),

    /// `send_message` carried an unrecognized mode.
    #[error("Invalid message mode.")]
    InvalidMode(String),

    /// `send_message` from a connection with no room.
    #[error("You are not in a chat room.")]
    NotInRoom,

    /// `select_role` from a connection already waiting in a queue.
    #[error("You are already waiting for a match.")]
    AlreadyQueued,

    /// `select_role` from a connection already in a room.
    #[error("You are already in a chat room.")]
    AlreadyInRoom,

    /// `select_role` asked for a role other than the one chosen earlier.
    #[error("Your role has already been chosen.")]
    RoleLocked {
        /// The role the connection already holds.
        current: Role,
    },

    /// The frame could not be decoded into a known event.
    #[error("Invalid payload.")]
    InvalidPayload(String),

    /// The event names a connection the service has never seen.
    #[error("Unknown connection.")]
    UnknownConnection,
}

impl MatchError {
    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRole(_) => "invalid_role",
            Self::InvalidMode(_) => "invalid_mode",
            Self::NotInRoom => "not_in_room",
            Self::AlreadyQueued => "already_queued",
            Self::AlreadyInRoom => "already_in_room",
            Self::RoleLocked { .. } => "role_locked",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::UnknownConnection => "unknown_connection",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_client_facing_text() {
        assert_eq!(
            MatchError::InvalidRole("x".into()).to_string(),
            "Invalid role selected."
        );
        assert_eq!(
            MatchError::InvalidMode("x".into()).to_string(),
            "Invalid message mode."
        );
        assert_eq!(MatchError::NotInRoom.to_string(), "You are not in a chat room.");
    }

    #[test]
    fn kind_strings_are_snake_case() {
        let errors = [
            MatchError::InvalidRole(String::new()),
            MatchError::InvalidMode(String::new()),
            MatchError::NotInRoom,
            MatchError::AlreadyQueued,
            MatchError::AlreadyInRoom,
            MatchError::RoleLocked {
                current: Role::Listener,
            },
            MatchError::InvalidPayload(String::new()),
            MatchError::UnknownConnection,
        ];
        for err in errors {
            let kind = err.kind();
            assert!(
                kind.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "kind '{kind}' must be snake_case"
            );
        }
    }
}
