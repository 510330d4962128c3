//! Point-in-time world snapshots for network transmission

use crate::ws::protocol::{ParticipantView, ServerMsg};

use super::Participant;

/// Read-consistent copy of the world
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store mutation counter at the time of the read
    pub version: u64,
    /// Participants, oldest join first
    pub participants: Vec<Participant>,
}

impl Snapshot {
    /// Build the `players-update` message for this snapshot
    pub fn to_message(&self) -> ServerMsg {
        let players = self
            .participants
            .iter()
            .map(|p| ParticipantView {
                id: p.id,
                name: p.name.clone(),
                x: p.x,
                y: p.y,
                rotation: p.rotation,
                coins: p.coins,
            })
            .collect();

        ServerMsg::PlayersUpdate { players }
    }
}
