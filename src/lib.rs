//! Ship Sync Server - real-time world-state synchronization for the ship shooter
//!
//! Clients connect over WebSocket, claim a unique display name, stream
//! position and coin events, and receive the full merged world after every
//! accepted change.

pub mod app;
pub mod config;
pub mod http;
pub mod util;
pub mod world;
pub mod ws;
