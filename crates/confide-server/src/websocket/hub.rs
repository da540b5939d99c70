//! The hub: a single task that owns the [`MatchService`] and applies
//! connection events one at a time.
//!
//! Sessions never touch matchmaking state. They push [`HubEvent`]s onto one
//! mpsc queue; the hub drains it in arrival order, so every pairing,
//! teardown, and relay runs to completion before the next event is seen.
//! Outbound events go through [`HubTransport`], which enqueues onto each
//! connection's bounded channel without awaiting.

use std::sync::Arc;

use confide_core::{
    ClientEvent, ConnectionId, Delivery, GroupTable, MatchError, MatchService, Outcome, Role,
    RoomId, ServerEvent, Speaker, Stats, Transport,
};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::ConnectionRegistry;
use crate::metrics::{
    CONFESSIONS_BURNED_TOTAL, EVENTS_REJECTED_TOTAL, MATCHES_TOTAL, MESSAGES_RELAYED_TOTAL,
    QUEUE_WAITING, ROOMS_ABANDONED_TOTAL, ROOMS_ACTIVE,
};

/// Capacity of the session → hub queue.
pub const HUB_QUEUE_CAPACITY: usize = 1024;

/// A connection lifecycle event, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HubEvent {
    /// A connection was accepted and registered.
    Connected(ConnectionId),
    /// A text frame arrived.
    Frame {
        /// Sender.
        conn: ConnectionId,
        /// Raw frame text.
        text: String,
    },
    /// A binary frame arrived that is not UTF-8.
    Undecodable(ConnectionId),
    /// The connection is gone.
    Disconnected(ConnectionId),
}

/// [`Transport`] over the live connection registry.
pub struct HubTransport {
    registry: Arc<ConnectionRegistry>,
    groups: GroupTable,
}

impl HubTransport {
    /// Wrap a registry with an empty group table.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            groups: GroupTable::new(),
        }
    }

    /// Current group membership.
    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }
}

impl Transport for HubTransport {
    fn emit(&mut self, to: &ConnectionId, event: ServerEvent) {
        let _ = self.registry.send_to(to, &event);
    }

    fn join(&mut self, conn: &ConnectionId, room: &RoomId) {
        self.groups.join(conn, room);
    }

    fn leave(&mut self, conn: &ConnectionId, room: &RoomId) {
        self.groups.leave(conn, room);
    }

    fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.groups.members(room)
    }
}

/// Cloneable handle sessions and HTTP handlers use to reach the hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
    stats: watch::Receiver<Stats>,
}

impl HubHandle {
    /// Queue an event. Returns `false` once the hub has stopped.
    pub async fn send(&self, event: HubEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Latest published counters.
    pub fn stats(&self) -> Stats {
        *self.stats.borrow()
    }

    /// Subscribe to counter updates.
    pub fn watch_stats(&self) -> watch::Receiver<Stats> {
        self.stats.clone()
    }
}

/// Matchmaking state plus the transport it emits through.
pub struct Hub {
    service: MatchService,
    transport: HubTransport,
    stats: watch::Sender<Stats>,
}

impl Hub {
    /// Create a hub over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> (Self, watch::Receiver<Stats>) {
        let (stats, stats_rx) = watch::channel(Stats::default());
        let hub = Self {
            service: MatchService::new(),
            transport: HubTransport::new(registry),
            stats,
        };
        (hub, stats_rx)
    }

    /// Read-only view of the service.
    pub fn service(&self) -> &MatchService {
        &self.service
    }

    /// Read-only view of the transport.
    pub fn transport(&self) -> &HubTransport {
        &self.transport
    }

    /// Apply one event, then publish counters.
    pub fn process(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected(conn) => {
                let _ = self.service.connect(conn);
            }
            HubEvent::Frame { conn, text } => self.on_frame(&conn, &text),
            HubEvent::Undecodable(conn) => {
                let err = MatchError::InvalidPayload("frame is not UTF-8".into());
                counter!(EVENTS_REJECTED_TOTAL, "kind" => err.kind()).increment(1);
                self.service.reject(&mut self.transport, &conn, &err);
            }
            HubEvent::Disconnected(conn) => {
                let departure = self.service.disconnect(&mut self.transport, &conn);
                if departure.is_some_and(|d| d.room_id.is_some()) {
                    counter!(ROOMS_ABANDONED_TOTAL).increment(1);
                }
            }
        }
        self.publish();
    }

    fn on_frame(&mut self, conn: &ConnectionId, text: &str) {
        let event = match ClientEvent::parse(text) {
            Ok(event) => event,
            Err(err) => {
                counter!(EVENTS_REJECTED_TOTAL, "kind" => err.kind()).increment(1);
                self.service.reject(&mut self.transport, conn, &err);
                return;
            }
        };
        debug!(conn_id = %conn, event_type = event.event_type(), "client event");

        match self.service.handle(&mut self.transport, conn, event) {
            Outcome::Queued { pairings, .. } => {
                if !pairings.is_empty() {
                    counter!(MATCHES_TOTAL).increment(pairings.len() as u64);
                }
            }
            Outcome::Delivered(Delivery::Relayed { from, .. }) => {
                let label = match from {
                    Speaker::Confessor => "confessor",
                    Speaker::Listener => "listener",
                };
                counter!(MESSAGES_RELAYED_TOTAL, "from" => label).increment(1);
            }
            Outcome::Delivered(Delivery::Burned { .. }) => {
                counter!(CONFESSIONS_BURNED_TOTAL).increment(1);
            }
            Outcome::Rejected(err) => {
                counter!(EVENTS_REJECTED_TOTAL, "kind" => err.kind()).increment(1);
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish(&self) {
        let stats = self.service.stats();
        gauge!(QUEUE_WAITING, "role" => Role::Confessor.as_str()).set(stats.waiting_confessors as f64);
        gauge!(QUEUE_WAITING, "role" => Role::Listener.as_str()).set(stats.waiting_listeners as f64);
        gauge!(ROOMS_ACTIVE).set(stats.active_rooms as f64);
        let _ = self.stats.send_if_modified(|current| {
            if *current == stats {
                false
            } else {
                *current = stats;
                true
            }
        });
    }

    /// Drain `rx` until it closes or `cancel` fires.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubEvent>, cancel: CancellationToken) {
        info!("hub started");
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.process(event),
                    None => break,
                },
                () = cancel.cancelled() => break,
            }
        }
        info!(stats = ?self.service.stats(), "hub stopped");
    }
}

/// Spawn the hub task. Returns the handle sessions use and the task handle.
pub fn spawn_hub(
    registry: Arc<ConnectionRegistry>,
    capacity: usize,
    cancel: CancellationToken,
) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let (hub, stats) = Hub::new(registry);
    let task = tokio::spawn(hub.run(rx, cancel));
    (HubHandle { tx, stats }, task)
}
