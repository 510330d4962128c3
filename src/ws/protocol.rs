//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::world::ConnectionId;

/// Messages sent from client to server
///
/// Payload fields are kept loosely typed here; the router validates them
/// before anything reaches the world store.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMsg {
    /// Claim a display name and spawn into the world
    PlayerJoin {
        #[serde(default)]
        name: Option<Value>,
        #[serde(default)]
        x: Option<Value>,
        #[serde(default)]
        y: Option<Value>,
        /// Defaults to 0 when absent or not a number
        #[serde(default)]
        rotation: Option<Value>,
    },

    /// New position for the sender's ship
    PlayerMove {
        #[serde(default)]
        x: Option<Value>,
        #[serde(default)]
        y: Option<Value>,
        /// Orientation is left alone when absent or not a number
        #[serde(default)]
        rotation: Option<Value>,
    },

    /// The sender picked up a coin
    PlayerScore {},
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMsg {
    /// Sent once after the connection is registered
    Welcome {
        id: ConnectionId,
        server_time: u64,
    },

    /// Full world state, sent after every accepted change
    PlayersUpdate {
        players: Vec<ParticipantView>,
    },

    /// Join rejected, the requested name is in use (only to the requester)
    NameTaken,
}

/// Participant state as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ConnectionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Rotation in radians
    pub rotation: f64,
    pub coins: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_kebab_tags() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"player-join","name":"Nova","x":10,"y":20}"#).unwrap();
        match msg {
            ClientMsg::PlayerJoin { name, x, rotation, .. } => {
                assert_eq!(name, Some(Value::from("Nova")));
                assert_eq!(x.and_then(|v| v.as_f64()), Some(10.0));
                assert!(rotation.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn score_ignores_extra_fields() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"player-score","bonus":5}"#).unwrap();
        assert!(matches!(msg, ClientMsg::PlayerScore {}));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"player-teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"x":1}"#).is_err());
    }

    #[test]
    fn server_messages_wire_shape() {
        let json = serde_json::to_value(ServerMsg::NameTaken).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "name-taken" }));

        let id = ConnectionId::new();
        let json = serde_json::to_value(ServerMsg::PlayersUpdate {
            players: vec![ParticipantView {
                id,
                name: "Nova".to_string(),
                x: 10.0,
                y: 20.0,
                rotation: 0.0,
                coins: 2,
            }],
        })
        .unwrap();

        assert_eq!(json["type"], "players-update");
        assert_eq!(json["players"][0]["id"], id.to_string());
        assert_eq!(json["players"][0]["coins"], 2);
    }
}
