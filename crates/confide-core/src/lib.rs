//! # confide-core
//!
//! Matchmaking and room relay for anonymous confessor/listener chat.
//!
//! - **Branded IDs**: [`ConnectionId`], [`RoomId`] as newtypes for type safety
//! - **Roles**: [`Role`] (`confessor` / `listener`) and the relay label [`Speaker`]
//! - **Protocol**: inbound [`ClientEvent`]s, outbound [`ServerEvent`]s and their JSON envelope
//! - **Queues**: two FIFO [`RoleQueues`] drained by the pairing step
//! - **Service**: [`MatchService`] owns participant state and dispatches events
//! - **Transport**: the [`Transport`] seam the service emits through
//!
//! The service is synchronous and single-writer: the caller must hand it one
//! event at a time. The server crate does this from a single hub task.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;
pub mod queue;
pub mod role;
pub mod service;
pub mod test_utils;
pub mod transport;

pub use errors::MatchError;
pub use ids::{ConnectionId, RoomId};
pub use protocol::{ClientEvent, EventEnvelope, MessageMode, ServerEvent};
pub use queue::RoleQueues;
pub use role::{Role, Speaker};
pub use service::{Delivery, Departure, MatchService, Outcome, Pairing, Stats};
pub use transport::{GroupTable, Transport};
