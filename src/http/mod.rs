//! HTTP surface: router, health check

pub mod routes;

pub use routes::build_router;
