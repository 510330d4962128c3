//! The single authoritative participant table
//!
//! Every read and write of participant state goes through [`WorldStore`].
//! Each operation holds the lock for its whole duration, so the name check in
//! [`WorldStore::try_join`] and the insert that follows cannot be interleaved
//! with any other mutation.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ConnectionId, Participant, Snapshot};

/// Join rejected because another participant already holds the name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("display name {0:?} is already taken")]
pub struct NameConflict(pub String);

#[derive(Default)]
struct World {
    participants: HashMap<ConnectionId, Participant>,
    /// Bumped on every accepted mutation
    version: u64,
    next_seq: u64,
}

impl World {
    fn name_taken(&self, name: &str) -> bool {
        self.participants.values().any(|p| p.name == name)
    }
}

/// Owner of the world state
#[derive(Default)]
pub struct WorldStore {
    world: RwLock<World>,
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a participant under `name` with zero coins.
    ///
    /// Names are compared byte for byte.
    pub fn try_join(
        &self,
        id: ConnectionId,
        name: &str,
        x: f64,
        y: f64,
        rotation: f64,
    ) -> Result<(), NameConflict> {
        let mut world = self.world.write();

        if world.name_taken(name) {
            return Err(NameConflict(name.to_string()));
        }

        let seq = world.next_seq;
        world.next_seq += 1;
        world.version += 1;
        world.participants.insert(
            id,
            Participant {
                id,
                name: name.to_string(),
                x,
                y,
                rotation,
                coins: 0,
                seq,
            },
        );

        Ok(())
    }

    /// Overwrite position, and orientation when given.
    ///
    /// Returns `false` when `id` has not joined.
    pub fn update_position(&self, id: ConnectionId, x: f64, y: f64, rotation: Option<f64>) -> bool {
        let mut world = self.world.write();

        let Some(participant) = world.participants.get_mut(&id) else {
            return false;
        };
        participant.x = x;
        participant.y = y;
        if let Some(rotation) = rotation {
            participant.rotation = rotation;
        }

        world.version += 1;
        true
    }

    /// Add one coin, returning the new total.
    pub fn increment_score(&self, id: ConnectionId) -> Option<u64> {
        let mut world = self.world.write();

        let participant = world.participants.get_mut(&id)?;
        participant.coins = participant.coins.saturating_add(1);
        let coins = participant.coins;

        world.version += 1;
        Some(coins)
    }

    /// Drop a participant. Removing an absent id does nothing.
    pub fn remove(&self, id: ConnectionId) -> Option<Participant> {
        let mut world = self.world.write();

        let removed = world.participants.remove(&id);
        if removed.is_some() {
            world.version += 1;
        }
        removed
    }

    /// Consistent copy of every participant, oldest join first
    pub fn snapshot(&self) -> Snapshot {
        let world = self.world.read();

        let mut participants: Vec<Participant> = world.participants.values().cloned().collect();
        participants.sort_by_key(|p| p.seq);

        Snapshot {
            version: world.version,
            participants,
        }
    }

    pub fn len(&self) -> usize {
        self.world.read().participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
