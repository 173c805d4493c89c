//! HTTP surface: health, WebSocket upgrade and admin commands

pub mod middleware;
pub mod routes;

pub use routes::build_router;
