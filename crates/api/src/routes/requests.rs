//! Route definitions for the `/requests` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::requests;
use crate::state::AppState;

/// Routes mounted at `/requests`.
///
/// ```text
/// GET  /                -> list_all (admin)
/// POST /                -> create (requester, multipart)
/// GET  /mine            -> list_mine
/// GET  /assigned        -> list_assigned
/// GET  /{id}            -> get_by_id
/// POST /{id}/assign     -> assign
/// POST /{id}/complete   -> complete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(requests::list_all).post(requests::create))
        .route("/mine", get(requests::list_mine))
        .route("/assigned", get(requests::list_assigned))
        .route("/{id}", get(requests::get_by_id))
        .route("/{id}/assign", post(requests::assign))
        .route("/{id}/complete", post(requests::complete))
}
