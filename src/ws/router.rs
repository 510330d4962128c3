//! Inbound event validation and dispatch into the world store

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::world::{ConnectionId, NameConflict, WorldStore};

use super::broadcast::Dispatcher;
use super::protocol::ClientMsg;
use super::registry::{ConnectionRegistry, ConnectionState};

/// A client event that passed validation
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join {
        name: String,
        x: f64,
        y: f64,
        rotation: f64,
    },
    Move {
        x: f64,
        y: f64,
        rotation: Option<f64>,
    },
    Score,
}

/// Malformed or out-of-place client message. Dropped without reply.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("field `{0}` must be a finite number")]
    NotANumber(&'static str),

    #[error("display name must be non-empty text")]
    InvalidName,

    #[error("display name longer than {0} characters")]
    NameTooLong(usize),

    #[error("connection has already joined")]
    AlreadyJoined,
}

/// Why an event was not applied
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NameConflict(#[from] NameConflict),
}

/// Result of routing an accepted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// World changed and was broadcast
    Applied,
    /// Sender has no participant in the world; nothing changed
    UnknownConnection,
}

/// Validates client events and applies them to the world
pub struct EventRouter {
    world: Arc<WorldStore>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
    max_name_len: usize,
}

impl EventRouter {
    pub fn new(
        world: Arc<WorldStore>,
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<Dispatcher>,
        max_name_len: usize,
    ) -> Self {
        Self {
            world,
            registry,
            dispatcher,
            max_name_len,
        }
    }

    /// Parse, validate and apply one text frame
    pub fn handle_text(&self, id: ConnectionId, text: &str) -> Result<Routed, RouteError> {
        let msg: ClientMsg = serde_json::from_str(text)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        self.handle(id, msg)
    }

    pub fn handle(&self, id: ConnectionId, msg: ClientMsg) -> Result<Routed, RouteError> {
        let event = self.validate(msg)?;
        self.apply(id, event)
    }

    /// Check payload shape without touching any state
    pub fn validate(&self, msg: ClientMsg) -> Result<ClientEvent, ValidationError> {
        match msg {
            ClientMsg::PlayerJoin {
                name,
                x,
                y,
                rotation,
            } => {
                let name = match name {
                    Some(Value::String(name)) if !name.trim().is_empty() => name,
                    _ => return Err(ValidationError::InvalidName),
                };
                if name.chars().count() > self.max_name_len {
                    return Err(ValidationError::NameTooLong(self.max_name_len));
                }

                Ok(ClientEvent::Join {
                    name,
                    x: require_number(x, "x")?,
                    y: require_number(y, "y")?,
                    rotation: optional_number(rotation).unwrap_or(0.0),
                })
            }
            ClientMsg::PlayerMove { x, y, rotation } => Ok(ClientEvent::Move {
                x: require_number(x, "x")?,
                y: require_number(y, "y")?,
                rotation: optional_number(rotation),
            }),
            ClientMsg::PlayerScore {} => Ok(ClientEvent::Score),
        }
    }

    /// Apply a validated event and broadcast if the world changed
    pub fn apply(&self, id: ConnectionId, event: ClientEvent) -> Result<Routed, RouteError> {
        match event {
            ClientEvent::Join {
                name,
                x,
                y,
                rotation,
            } => {
                if self.registry.state(id) == Some(ConnectionState::Joined) {
                    return Err(ValidationError::AlreadyJoined.into());
                }

                if let Err(conflict) = self.world.try_join(id, &name, x, y, rotation) {
                    self.dispatcher.notify_name_taken(id);
                    return Err(conflict.into());
                }

                self.registry.mark_joined(id);
                info!(conn_id = %id, name = %name, "Player joined");
            }
            ClientEvent::Move { x, y, rotation } => {
                if !self.world.update_position(id, x, y, rotation) {
                    return Ok(Routed::UnknownConnection);
                }
            }
            ClientEvent::Score => match self.world.increment_score(id) {
                Some(coins) => debug!(conn_id = %id, coins, "Coin collected"),
                None => return Ok(Routed::UnknownConnection),
            },
        }

        self.dispatcher.publish();
        Ok(Routed::Applied)
    }

    /// Tear down a closed connection. Safe to call more than once.
    pub fn disconnect(&self, id: ConnectionId) {
        self.registry.unregister(id);

        if let Some(participant) = self.world.remove(id) {
            info!(conn_id = %id, name = %participant.name, coins = participant.coins, "Player left");
            self.dispatcher.publish();
        }
    }
}

fn require_number(value: Option<Value>, field: &'static str) -> Result<f64, ValidationError> {
    optional_number(value).ok_or(ValidationError::NotANumber(field))
}

fn optional_number(value: Option<Value>) -> Option<f64> {
    value.and_then(|v| v.as_f64()).filter(|n| n.is_finite())
}
