//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the user behind a JWT Bearer token.
//! - [`auth::WsAuthUser`] -- same, also reading `?token=` for WebSocket upgrades.
//! - [`rbac::RequireAdmin`], [`rbac::RequireWorker`], [`rbac::RequireRequester`] -- one role each.
//! - [`rbac::RequireAuth`] -- any known role.

pub mod auth;
pub mod rbac;
