//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use confide_core::{ConnectionId, ServerEvent};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::hub::{HubEvent, HubHandle};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Per-session knobs taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// How long to wait for a Pong before considering the client dead.
    pub pong_timeout: Duration,
    /// Outbound queue capacity.
    pub send_queue_capacity: usize,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(c: &ServerConfig) -> Self {
        Self {
            ping_interval: c.heartbeat_interval(),
            pong_timeout: c.heartbeat_timeout(),
            send_queue_capacity: c.send_queue_capacity,
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and sends `connection.established`
/// 2. Tells the hub the connection exists
/// 3. Forwards inbound text frames to the hub, in order
/// 4. Drains the outbound queue and sends periodic Pings
/// 5. On close, timeout, or shutdown, tells the hub and unregisters
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    hub: HubHandle,
    config: SessionConfig,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    registry.add(connection.clone());

    // The greeting goes out before the outbound forwarder starts, so it is
    // always the first frame the client sees.
    let greeting = ServerEvent::ConnectionEstablished {
        client_id: conn_id.clone(),
    };
    match greeting.to_frame() {
        Ok(json) => {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                debug!("client went away before greeting");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize greeting"),
    }

    if hub.send(HubEvent::Connected(conn_id.clone())).await {
        let outbound = tokio::spawn(forward_outbound(ws_tx, send_rx, connection.clone(), config));
        read_inbound(&mut ws_rx, &conn_id, &connection, &hub, &cancel).await;
        outbound.abort();
        let _ = hub.send(HubEvent::Disconnected(conn_id.clone())).await;
    } else {
        warn!("hub unavailable, closing connection");
    }

    let _ = registry.remove(&conn_id);
    info!(
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Drain the outbound queue onto the socket, pinging on an interval.
async fn forward_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Arc<String>>,
    connection: Arc<ClientConnection>,
    config: SessionConfig,
) {
    let mut ping_interval = tokio::time::interval(config.ping_interval);
    // Skip the immediate first tick
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !connection.check_alive() && connection.last_pong_elapsed() > config.pong_timeout {
                    warn!(timeout = ?config.pong_timeout, "client unresponsive, disconnecting");
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}

/// Forward inbound frames to the hub until close, error, or shutdown.
async fn read_inbound(
    ws_rx: &mut SplitStream<WebSocket>,
    conn_id: &ConnectionId,
    connection: &ClientConnection,
    hub: &HubHandle,
    cancel: &CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = cancel.cancelled() => {
                info!("server shutting down, closing session");
                return;
            }
            () = connection.closed() => {
                debug!("outbound side closed");
                return;
            }
        };
        let Some(Ok(msg)) = msg else { return };

        // Binary frames carrying UTF-8 are treated as text
        let event = match msg {
            Message::Text(t) => HubEvent::Frame {
                conn: conn_id.clone(),
                text: t.to_string(),
            },
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => HubEvent::Frame {
                    conn: conn_id.clone(),
                    text,
                },
                Err(_) => {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    HubEvent::Undecodable(conn_id.clone())
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                return;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
        };
        connection.mark_alive();

        if !hub.send(event).await {
            warn!("hub stopped, closing session");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_from_server_config() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 5,
            heartbeat_timeout_secs: 12,
            send_queue_capacity: 7,
            ..ServerConfig::default()
        };
        let s = SessionConfig::from(&cfg);
        assert_eq!(s.ping_interval, Duration::from_secs(5));
        assert_eq!(s.pong_timeout, Duration::from_secs(12));
        assert_eq!(s.send_queue_capacity, 7);
    }

    #[test]
    fn greeting_has_required_fields() {
        let json = ServerEvent::ConnectionEstablished {
            client_id: ConnectionId::from("test_client_123"),
        }
        .to_frame()
        .unwrap();
        let msg: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(msg["type"], "connection.established");
        assert_eq!(msg["data"]["clientId"], "test_client_123");
        assert!(msg["timestamp"].is_string());
    }
}
