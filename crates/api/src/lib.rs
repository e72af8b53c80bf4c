//! Curbside API server library.
//!
//! Exposes config, state, error handling, routes, the lifecycle service and
//! the WebSocket live views so integration tests and the binary entrypoint
//! share one application builder.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod response;
pub mod router;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;
