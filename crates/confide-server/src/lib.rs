//! # confide-server
//!
//! Axum HTTP + WebSocket gateway for Confide.
//!
//! - `/ws` upgrades to a WebSocket session driven by the matchmaking hub
//! - `/health` reports liveness plus queue and room counters
//! - `/metrics` renders Prometheus text
//! - Any other path falls back to the built web client, when configured
//!
//! All matchmaking state lives in one hub task; sessions talk to it through
//! a bounded queue and receive frames on their own bounded outbound queue.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::ConfideServer;
pub use shutdown::ShutdownCoordinator;
