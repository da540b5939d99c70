//! Participant roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MatchError;

/// Which side of a pairing a connection waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Originates confessions.
    Confessor,
    /// Receives and acknowledges confessions.
    Listener,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confessor => "confessor",
            Self::Listener => "listener",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confessor" => Ok(Self::Confessor),
            "listener" => Ok(Self::Listener),
            other => Err(MatchError::InvalidRole(other.to_owned())),
        }
    }
}

/// Sender label attached to relayed messages.
///
/// Derived from the message mode, not from the sender's role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    /// `normal` mode messages.
    Confessor,
    /// `listening` mode acknowledgments.
    Listener,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_known_roles() {
        assert_eq!("confessor".parse::<Role>().unwrap(), Role::Confessor);
        assert_eq!("listener".parse::<Role>().unwrap(), Role::Listener);
    }

    #[test]
    fn role_parsing_is_case_sensitive() {
        assert_matches!("Listener".parse::<Role>(), Err(MatchError::InvalidRole(r)) if r == "Listener");
    }

    #[test]
    fn rejects_unknown_role() {
        assert_matches!("priest".parse::<Role>(), Err(MatchError::InvalidRole(_)));
        assert_matches!("".parse::<Role>(), Err(MatchError::InvalidRole(_)));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Confessor).unwrap(), "confessor");
        assert_eq!(serde_json::to_value(Role::Listener).unwrap(), "listener");
    }

    #[test]
    fn speaker_serializes_capitalized() {
        assert_eq!(serde_json::to_value(Speaker::Confessor).unwrap(), "Confessor");
        assert_eq!(serde_json::to_value(Speaker::Listener).unwrap(), "Listener");
    }
}
