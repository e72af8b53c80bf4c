pub mod auth;
pub mod health;
pub mod pages;
pub mod requests;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket live view (?token=)
///
/// /auth/register                       register (public)
/// /auth/login                          login (public)
/// /auth/me                             current account (any role)
///
/// /dashboard                           role-dispatched snapshot (any role)
///
/// /requests                            list all (admin), submit (requester)
/// /requests/mine                       own requests (requester)
/// /requests/assigned                   open assignments (worker)
/// /requests/{id}                       get (owner, assignee, admin)
/// /requests/{id}/assign                assign to a worker (admin)
/// /requests/{id}/complete              mark completed (assignee)
///
/// /workers                             worker roster (admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        .nest("/requests", requests::router())
        .route("/workers", get(handlers::workers::list_workers))
}
