//! WebSocket plumbing: per-connection state, the connection registry, the
//! matchmaking hub, and the session loop that ties a socket to both.

pub mod connection;
pub mod hub;
pub mod registry;
pub mod session;

pub use connection::ClientConnection;
pub use hub::{HUB_QUEUE_CAPACITY, Hub, HubEvent, HubHandle, HubTransport, spawn_hub};
pub use registry::ConnectionRegistry;
pub use session::{SessionConfig, run_ws_session};
