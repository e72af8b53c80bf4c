//! One-shot dashboard snapshot.
//!
//! Returns the same role-dispatched view the WebSocket pushes, for clients
//! that poll or need a first paint before the socket opens.

use axum::extract::State;
use axum::Json;
use curbside_events::{Snapshot, ViewScope};

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /dashboard
pub async fn get_dashboard(
    RequireAuth(auth): RequireAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Snapshot>>> {
    let scope = ViewScope::for_role(auth.role()?, auth.user_id);
    let snapshot = scope.project(state.store.as_ref()).await?;
    Ok(Json(DataResponse { data: snapshot }))
}
