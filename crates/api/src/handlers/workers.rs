//! Handlers for the worker roster administrators assign from.

use axum::extract::State;
use axum::Json;
use curbside_core::roles::Role;
use curbside_db::models::user::WorkerSummary;
use curbside_db::UserDirectory;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /workers -- every user holding the `worker` role, by name.
pub async fn list_workers(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<WorkerSummary>>>> {
    let workers = state.store.list_users_by_role(Role::Worker).await?;
    Ok(Json(DataResponse {
        data: workers.iter().map(WorkerSummary::from).collect(),
    }))
}
