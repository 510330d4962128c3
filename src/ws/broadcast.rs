//! Fan-out of world snapshots to every connection

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::util::time::unix_millis;
use crate::world::{ConnectionId, WorldStore};

use super::protocol::ServerMsg;
use super::registry::ConnectionRegistry;

/// Publishes the world to all registered connections.
///
/// Snapshots are read and handed out under `last_published`, so every
/// connection sees versions in increasing order. Each connection keeps only
/// the newest snapshot it has not yet written.
pub struct Dispatcher {
    world: Arc<WorldStore>,
    registry: Arc<ConnectionRegistry>,
    /// Version of the last snapshot fanned out
    last_published: Mutex<u64>,
}

impl Dispatcher {
    pub fn new(world: Arc<WorldStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            world,
            registry,
            last_published: Mutex::new(0),
        }
    }

    /// Send the current world to every connection, the triggering one included.
    ///
    /// Returns how many connections the snapshot was handed to. Nothing is
    /// sent when a concurrent publish already delivered this version or a newer one.
    pub fn publish(&self) -> usize {
        let mut last = self.last_published.lock();

        let snapshot = self.world.snapshot();
        if snapshot.version <= *last {
            debug!(version = snapshot.version, "Snapshot already published");
            return 0;
        }

        let Some(payload) = encode(&snapshot.to_message()) else {
            return 0;
        };
        *last = snapshot.version;

        let mut delivered = 0;
        self.registry.for_each(|id, sender| {
            if sender.set_world(id, payload.clone()) {
                delivered += 1;
            }
        });

        debug!(
            version = snapshot.version,
            participants = snapshot.participants.len(),
            delivered,
            "Published world snapshot"
        );
        delivered
    }

    /// Greet a freshly registered connection with its id and the current world
    pub fn welcome(&self, id: ConnectionId) {
        let welcome = ServerMsg::Welcome {
            id,
            server_time: unix_millis(),
        };

        let _last = self.last_published.lock();
        let snapshot = self.world.snapshot();

        if let Some(payload) = encode(&welcome) {
            self.registry.send_to(id, payload);
        }
        if let Some(payload) = encode(&snapshot.to_message()) {
            self.registry.set_world(id, payload);
        }
    }

    /// Tell one connection its join was refused
    pub fn notify_name_taken(&self, id: ConnectionId) {
        if let Some(payload) = encode(&ServerMsg::NameTaken) {
            self.registry.send_to(id, payload);
        }
    }
}

fn encode(msg: &ServerMsg) -> Option<Arc<str>> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(error = %e, "Failed to serialize server message");
            None
        }
    }
}
