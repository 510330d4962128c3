//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::world::WorldStore;
use crate::ws::{ConnectionRegistry, Dispatcher, EventRouter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: Arc<WorldStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub router: Arc<EventRouter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let world = Arc::new(WorldStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(world.clone(), registry.clone()));
        let router = Arc::new(EventRouter::new(
            world.clone(),
            registry.clone(),
            dispatcher.clone(),
            config.max_name_len,
        ));

        Self {
            config,
            world,
            registry,
            dispatcher,
            router,
        }
    }
}
