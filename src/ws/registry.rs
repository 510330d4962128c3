//! Registry of open WebSocket connections

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::world::ConnectionId;

/// Sending side of one connection's outbound path.
///
/// Payloads are pre-serialized JSON text frames. Direct messages go through a
/// bounded queue; the world snapshot is a single latest-wins slot, so a slow
/// reader skips intermediate worlds but always ends on the newest one.
#[derive(Clone)]
pub struct ConnectionSender {
    unicast: mpsc::Sender<Arc<str>>,
    world: Arc<watch::Sender<Arc<str>>>,
}

impl ConnectionSender {
    /// Queue a direct message. A full or closed queue drops it.
    pub fn send(&self, id: ConnectionId, payload: Arc<str>) -> bool {
        match self.unicast.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn_id = %id, "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id = %id, "Outbound queue closed");
                false
            }
        }
    }

    /// Replace the pending world snapshot with a newer one
    pub fn set_world(&self, id: ConnectionId, payload: Arc<str>) -> bool {
        self.world.send_replace(payload);
        if self.world.is_closed() {
            debug!(conn_id = %id, "World channel closed");
            return false;
        }
        true
    }
}

/// Receiving side of one connection's outbound path, owned by its writer task
pub struct OutboundReceiver {
    unicast: mpsc::Receiver<Arc<str>>,
    world: watch::Receiver<Arc<str>>,
}

impl OutboundReceiver {
    /// Next frame to write. Pending direct messages go before the world.
    ///
    /// Returns `None` once the connection has been unregistered.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        tokio::select! {
            biased;
            msg = self.unicast.recv() => msg,
            changed = self.world.changed() => match changed {
                Ok(()) => Some(self.world.borrow_and_update().clone()),
                Err(_) => None,
            },
        }
    }

    /// Non-waiting variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        if let Ok(msg) = self.unicast.try_recv() {
            return Some(msg);
        }
        match self.world.has_changed() {
            Ok(true) => Some(self.world.borrow_and_update().clone()),
            _ => None,
        }
    }
}

/// Create the outbound path for a new connection.
/// `capacity` bounds the direct-message queue and must be non-zero.
pub fn outbound_channel(capacity: usize) -> (ConnectionSender, OutboundReceiver) {
    let (unicast_tx, unicast_rx) = mpsc::channel(capacity);
    let (world_tx, world_rx) = watch::channel(Arc::<str>::from(""));

    (
        ConnectionSender {
            unicast: unicast_tx,
            world: Arc::new(world_tx),
        },
        OutboundReceiver {
            unicast: unicast_rx,
            world: world_rx,
        },
    )
}

/// Where a registered connection is in its lifecycle.
///
/// Connections that have closed are no longer in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered but not (yet) holding a name
    Open,
    /// Holds a participant in the world
    Joined,
}

struct Connection {
    sender: ConnectionSender,
    state: ConnectionState,
}

/// All open connections, keyed by id
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound path and hand out a fresh id
    pub fn register(&self, sender: ConnectionSender) -> ConnectionId {
        loop {
            let id = ConnectionId::new();
            // v4 collisions are not expected, but an id in use must never be reissued
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.connections.entry(id) {
                slot.insert(Connection {
                    sender,
                    state: ConnectionState::Open,
                });
                return id;
            }
        }
    }

    /// Forget a connection. Returns `false` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&id).map(|c| c.state)
    }

    /// Move a connection from `Open` to `Joined`
    pub fn mark_joined(&self, id: ConnectionId) -> bool {
        match self.connections.get_mut(&id) {
            Some(mut conn) => {
                conn.state = ConnectionState::Joined;
                true
            }
            None => false,
        }
    }

    /// Queue a direct message for one connection. Unknown ids are ignored.
    pub fn send_to(&self, id: ConnectionId, payload: Arc<str>) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.sender.send(id, payload),
            None => false,
        }
    }

    /// Hand one connection a world snapshot. Unknown ids are ignored.
    pub fn set_world(&self, id: ConnectionId, payload: Arc<str>) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.sender.set_world(id, payload),
            None => false,
        }
    }

    /// Visit every registered connection
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(ConnectionId, &ConnectionSender),
    {
        for entry in self.connections.iter() {
            f(*entry.key(), &entry.value().sender);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn register_hands_out_distinct_ids() {
        let registry = ConnectionRegistry::new();
        let mut ids = std::collections::HashSet::new();
        let mut receivers = Vec::new();

        for _ in 0..32 {
            let (tx, rx) = outbound_channel(4);
            receivers.push(rx);
            assert!(ids.insert(registry.register(tx)));
        }
        assert_eq!(registry.len(), 32);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel(4);
        let id = registry.register(tx);

        assert_eq!(registry.state(id), Some(ConnectionState::Open));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.state(id), None);
        assert!(!registry.mark_joined(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn mark_joined_moves_state() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel(4);
        let id = registry.register(tx);

        assert!(registry.mark_joined(id));
        assert_eq!(registry.state(id), Some(ConnectionState::Joined));
    }

    #[test]
    fn send_to_reaches_only_target() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = outbound_channel(4);
        let (tx_b, mut rx_b) = outbound_channel(4);
        let a = registry.register(tx_a);
        registry.register(tx_b);

        assert!(registry.send_to(a, payload("hello")));
        assert_eq!(rx_a.try_recv().as_deref(), Some("hello"));
        assert!(rx_b.try_recv().is_none());

        assert!(!registry.send_to(ConnectionId::new(), payload("nobody")));
    }

    #[test]
    fn slow_connection_ends_on_latest_world() {
        let registry = ConnectionRegistry::new();
        let (tx_slow, mut rx_slow) = outbound_channel(1);
        let (tx_fast, mut rx_fast) = outbound_channel(8);
        let slow = registry.register(tx_slow);
        registry.register(tx_fast);

        // fill the slow connection's direct queue
        assert!(registry.send_to(slow, payload("welcome")));
        assert!(!registry.send_to(slow, payload("overflow")));

        for world in ["world-1", "world-2", "world-3"] {
            let mut delivered = 0;
            registry.for_each(|id, sender| {
                if sender.set_world(id, payload(world)) {
                    delivered += 1;
                }
            });
            assert_eq!(delivered, 2);
        }

        assert_eq!(rx_slow.try_recv().as_deref(), Some("welcome"));
        assert_eq!(rx_slow.try_recv().as_deref(), Some("world-3"));
        assert!(rx_slow.try_recv().is_none());
        assert_eq!(rx_fast.try_recv().as_deref(), Some("world-3"));
    }

    #[tokio::test]
    async fn recv_prefers_direct_messages_and_ends_on_unregister() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = outbound_channel(4);
        let id = registry.register(tx);

        registry.set_world(id, payload("world"));
        registry.send_to(id, payload("welcome"));

        assert_eq!(rx.recv().await.as_deref(), Some("welcome"));
        assert_eq!(rx.recv().await.as_deref(), Some("world"));

        registry.unregister(id);
        assert!(rx.recv().await.is_none());
    }
}
