//! Confessor and listener waiting queues.

use std::collections::VecDeque;

use crate::ids::ConnectionId;
use crate::role::Role;

/// Two FIFO queues of connections waiting for a partner.
///
/// Callers keep each connection in at most one queue; [`RoleQueues`] itself
/// does not deduplicate.
#[derive(Debug, Default)]
pub struct RoleQueues {
    confessors: VecDeque<ConnectionId>,
    listeners: VecDeque<ConnectionId>,
}

impl RoleQueues {
    /// Create empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_mut(&mut self, role: Role) -> &mut VecDeque<ConnectionId> {
        match role {
            Role::Confessor => &mut self.confessors,
            Role::Listener => &mut self.listeners,
        }
    }

    fn queue(&self, role: Role) -> &VecDeque<ConnectionId> {
        match role {
            Role::Confessor => &self.confessors,
            Role::Listener => &self.listeners,
        }
    }

    /// Append to the tail of the role's queue.
    pub fn push(&mut self, role: Role, conn: ConnectionId) {
        self.queue_mut(role).push_back(conn);
    }

    /// Pop the head of both queues together, or neither.
    ///
    /// Returns `(confessor, listener)`.
    pub fn pop_pair(&mut self) -> Option<(ConnectionId, ConnectionId)> {
        if self.confessors.is_empty() || self.listeners.is_empty() {
            return None;
        }
        let confessor = self.confessors.pop_front()?;
        let listener = self.listeners.pop_front()?;
        Some((confessor, listener))
    }

    /// Remove a connection from whichever queue holds it, keeping the order
    /// of the rest. Returns the role it was queued under.
    pub fn remove(&mut self, conn: &ConnectionId) -> Option<Role> {
        for role in [Role::Confessor, Role::Listener] {
            let queue = self.queue_mut(role);
            if let Some(pos) = queue.iter().position(|c| c == conn) {
                let _ = queue.remove(pos);
                return Some(role);
            }
        }
        None
    }

    /// Whether the connection is waiting in either queue.
    pub fn contains(&self, conn: &ConnectionId) -> bool {
        self.confessors.contains(conn) || self.listeners.contains(conn)
    }

    /// Number waiting for a role.
    pub fn len(&self, role: Role) -> usize {
        self.queue(role).len()
    }

    /// Whether both queues are empty.
    pub fn is_empty(&self) -> bool {
        self.confessors.is_empty() && self.listeners.is_empty()
    }

    /// Whether at least one queue is empty, so no pairing is possible.
    pub fn is_drained(&self) -> bool {
        self.confessors.is_empty() || self.listeners.is_empty()
    }

    /// Waiting connections for a role, head first.
    pub fn iter(&self, role: Role) -> impl Iterator<Item = &ConnectionId> {
        self.queue(role).iter()
    }
}
