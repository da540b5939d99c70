//! Wire protocol: inbound client events and outbound server events.
//!
//! Both directions share one JSON envelope:
//!
//! ```json
//! {"type": "receive_message", "timestamp": "2026-01-01T00:00:00Z", "data": {...}}
//! ```
//!
//! Inbound frames only need `type` and `data`; any `timestamp` is ignored.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::MatchError;
use crate::ids::{ConnectionId, RoomId};
use crate::role::{Role, Speaker};

/// Fixed text relayed for a `listening` acknowledgment.
pub const LISTENING_TEXT: &str = "I'm listening";

/// Event type sent to a client right after it connects.
pub const CONNECTION_ESTABLISHED: &str = "connection.established";

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Raw inbound frame before the payload is interpreted.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// Payload of a `send_message` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OutgoingMessage {
    /// Message text. Only relayed in `normal` mode.
    #[serde(default)]
    pub message: String,
    /// Declared mode, validated by the router.
    #[serde(default)]
    pub mode: String,
}

/// An event sent by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// Choose a role and join its waiting queue.
    SelectRole(String),
    /// Send a message into the current room.
    SendMessage(OutgoingMessage),
}

impl ClientEvent {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, MatchError> {
        let frame: ClientFrame =
            serde_json::from_str(text).map_err(|e| MatchError::InvalidPayload(e.to_string()))?;
        match frame.event_type.as_str() {
            // A missing or non-string role is still a role selection; the
            // matchmaker rejects it as an invalid role.
            "select_role" => Ok(Self::SelectRole(match frame.data {
                Value::String(role) => role,
                Value::Null => String::new(),
                other => other.to_string(),
            })),
            "send_message" => serde_json::from_value(frame.data)
                .map(Self::SendMessage)
                .map_err(|e| MatchError::InvalidPayload(e.to_string())),
            other => Err(MatchError::InvalidPayload(format!(
                "unknown event type '{other}'"
            ))),
        }
    }

    /// Event type name, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SelectRole(_) => "select_role",
            Self::SendMessage(_) => "send_message",
        }
    }
}

/// How the router treats a `send_message`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageMode {
    /// Burn the confession unread and end the room.
    Solo,
    /// Relay the fixed listening acknowledgment.
    Listening,
    /// Relay the caller's text.
    Normal,
}

impl FromStr for MessageMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solo" => Ok(Self::Solo),
            "listening" => Ok(Self::Listening),
            "normal" => Ok(Self::Normal),
            other => Err(MatchError::InvalidMode(other.to_owned())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// A notification emitted to one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// Greeting carrying the connection's own ID.
    ConnectionEstablished {
        /// The client's connection ID.
        client_id: ConnectionId,
    },
    /// The connection was paired into a room.
    Matched {
        /// The recipient's own role.
        role: Role,
        /// The room both participants now share.
        room_id: RoomId,
    },
    /// A rejected event, reported to its sender only.
    ErrorMessage(String),
    /// Acknowledges the sender's own burn.
    BurnConfession,
    /// The other participant burned the confession.
    ConfessionBurned,
    /// A relayed message.
    ReceiveMessage {
        /// Sender label.
        from: Speaker,
        /// Message text.
        message: String,
    },
    /// The other participant dropped.
    ParticipantDisconnected,
}

impl ServerEvent {
    /// Wire event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => CONNECTION_ESTABLISHED,
            Self::Matched { .. } => "matched",
            Self::ErrorMessage(_) => "error_message",
            Self::BurnConfession => "burn_confession",
            Self::ConfessionBurned => "confession_burned",
            Self::ReceiveMessage { .. } => "receive_message",
            Self::ParticipantDisconnected => "participant_disconnected",
        }
    }

    /// Event payload, if the event carries one.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::ConnectionEstablished { client_id } => Some(json!({ "clientId": client_id })),
            Self::Matched { role, room_id } => Some(json!({ "role": role, "roomId": room_id })),
            Self::ErrorMessage(text) => Some(Value::String(text.clone())),
            Self::ReceiveMessage { from, message } => {
                Some(json!({ "from": from, "message": message }))
            }
            Self::BurnConfession | Self::ConfessionBurned | Self::ParticipantDisconnected => None,
        }
    }

    /// Wrap in a timestamped envelope.
    pub fn envelope(&self) -> EventEnvelope {
        EventEnvelope {
            event_type: self.event_type().to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data: self.data(),
        }
    }

    /// Serialize the envelope to a JSON text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.envelope())
    }
}

/// JSON envelope for outbound events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// RFC 3339 emission time.
    pub timestamp: String,
    /// Event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
