//! Real-time WebSocket layer: connections, routing and fan-out

pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod router;

pub use broadcast::Dispatcher;
pub use registry::{ConnectionRegistry, ConnectionSender, ConnectionState};
pub use router::{EventRouter, RouteError, Routed, ValidationError};
