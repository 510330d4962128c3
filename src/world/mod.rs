//! Shared world state: participants and the store that owns them

pub mod snapshot;
pub mod store;

pub use snapshot::Snapshot;
pub use store::{NameConflict, WorldStore};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of one live connection.
///
/// A participant shares the id of the connection that joined it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A joined, named ship in the world (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,

    // Position and orientation
    pub x: f64,
    pub y: f64,
    /// Rotation in radians
    pub rotation: f64,

    /// Coins collected since joining
    pub coins: u64,

    /// Join order, used to keep snapshots stable
    pub(crate) seq: u64,
}
