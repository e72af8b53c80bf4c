//! Handlers for pickup requests: submission, per-role listings, assignment
//! and completion.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use curbside_core::error::CoreError;
use curbside_core::request::{RequestStatus, SubmissionDraft};
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use curbside_db::models::request::{RequestFilter, RequestOrder};
use curbside_db::RequestStore;
use curbside_events::live::RequestView;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAdmin, RequireAuth, RequireRequester, RequireWorker};
use crate::response::DataResponse;
use crate::services::{PhotoUpload, RequestLifecycle};
use crate::state::AppState;

/// Request body for `POST /requests/{id}/assign`.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub worker_id: DbId,
}

// ---------------------------------------------------------------------------
// POST /requests  (multipart)
// ---------------------------------------------------------------------------

/// Submit a pickup request.
///
/// Multipart fields: `description`, `latitude`, `longitude`, optional
/// `location`, optional `photo` (image file).
pub async fn create(
    RequireRequester(auth): RequireRequester,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<RequestView>>)> {
    let (draft, photo) = read_submission(multipart).await?;
    let created = RequestLifecycle::from_state(&state)
        .submit(auth.user_id, draft, photo)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: created.into(),
        }),
    ))
}

async fn read_submission(
    mut multipart: Multipart,
) -> AppResult<(SubmissionDraft, Option<PhotoUpload>)> {
    let mut draft = SubmissionDraft::default();
    let mut photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read photo: {e}")))?;
                photo = Some(PhotoUpload {
                    bytes: bytes.to_vec(),
                });
            }
            "description" | "latitude" | "longitude" | "location" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    "description" => draft.description = text,
                    "latitude" => draft.latitude = parse_coordinate(&name, &text)?,
                    "longitude" => draft.longitude = parse_coordinate(&name, &text)?,
                    _ => draft.location = Some(text),
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok((draft, photo))
}

/// Blank means "not picked".
fn parse_coordinate(field: &str, raw: &str) -> AppResult<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("{field} must be a number, got '{raw}'")))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// GET /requests/mine -- the caller's own requests, newest first.
pub async fn list_mine(
    RequireRequester(auth): RequireRequester,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<RequestView>>>> {
    let filter = RequestFilter {
        order: Some(RequestOrder::CreatedDesc),
        ..RequestFilter::requested_by(auth.user_id)
    };
    list_with(&state, &filter).await
}

/// GET /requests/assigned -- open work for the calling worker, most
/// recently updated first.
pub async fn list_assigned(
    RequireWorker(auth): RequireWorker,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<RequestView>>>> {
    let filter = RequestFilter {
        order: Some(RequestOrder::UpdatedDesc),
        ..RequestFilter::assigned_to(auth.user_id, RequestStatus::Assigned)
    };
    list_with(&state, &filter).await
}

/// GET /requests -- every request, newest first.
pub async fn list_all(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<RequestView>>>> {
    list_with(&state, &RequestFilter::all_newest_first()).await
}

async fn list_with(
    state: &AppState,
    filter: &RequestFilter,
) -> AppResult<Json<DataResponse<Vec<RequestView>>>> {
    let requests = state.store.query_requests(filter).await?;
    Ok(Json(DataResponse {
        data: requests.into_iter().map(RequestView::from).collect(),
    }))
}

// ---------------------------------------------------------------------------
// GET /requests/{id}
// ---------------------------------------------------------------------------

/// Visible to its requester, its assignee and administrators.
pub async fn get_by_id(
    RequireAuth(auth): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RequestView>>> {
    let request = state
        .store
        .find_request(id)
        .await?
        .ok_or_else(|| CoreError::request_not_found(id))?;

    let allowed = match auth.role()? {
        Role::Admin => true,
        Role::Requester => request.requester_id == auth.user_id,
        Role::Worker => request.assignee_id == Some(auth.user_id),
    };
    if !allowed {
        return Err(CoreError::Forbidden("You do not have access to this request".into()).into());
    }

    Ok(Json(DataResponse {
        data: request.into(),
    }))
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// POST /requests/{id}/assign
pub async fn assign(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AssignRequest>,
) -> AppResult<Json<DataResponse<RequestView>>> {
    let updated = RequestLifecycle::from_state(&state)
        .assign(admin.user_id, id, input.worker_id)
        .await?;
    Ok(Json(DataResponse {
        data: updated.into(),
    }))
}

/// POST /requests/{id}/complete
pub async fn complete(
    RequireWorker(worker): RequireWorker,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RequestView>>> {
    let updated = RequestLifecycle::from_state(&state)
        .complete(worker.user_id, id)
        .await?;
    Ok(Json(DataResponse {
        data: updated.into(),
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn blank_coordinate_is_absent() {
        assert_eq!(parse_coordinate("latitude", "  ").unwrap(), None);
    }

    #[test]
    fn numeric_coordinate_parses() {
        assert_eq!(parse_coordinate("latitude", "12.5").unwrap(), Some(12.5));
    }

    #[test]
    fn garbage_coordinate_is_bad_request() {
        assert_matches!(
            parse_coordinate("longitude", "east"),
            Err(AppError::BadRequest(msg)) if msg.contains("longitude")
        );
    }
}
