//! The request lifecycle: submit, assign, complete.
//!
//! Each operation validates and resolves everything it needs before its one
//! store write, so a rejected call leaves no trace. Status preconditions are
//! checked against a fresh read. Two assignments racing on the same open
//! request both succeed and the later write wins, but the store refuses an
//! assignment that would land on a completed request.

use std::sync::Arc;

use chrono::Utc;
use curbside_core::error::CoreError;
use curbside_core::request::{photo_object_path, RequestStatus, SubmissionDraft};
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use curbside_db::media::{MediaStore, UploadProgress};
use curbside_db::models::request::{CreateServiceRequest, RequestPatch, ServiceRequest};
use curbside_db::models::user::User;
use curbside_db::{RequestStore, SharedStore, UserDirectory};
use curbside_events::bus::{
    ENTITY_SERVICE_REQUEST, EVENT_REQUEST_ASSIGNED, EVENT_REQUEST_COMPLETED,
    EVENT_REQUEST_CREATED, EVENT_UPLOAD_PROGRESS,
};
use curbside_events::{EventBus, PlatformEvent};
use serde_json::json;

use super::photo;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// A photo attached to a submission, as received.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
}

pub struct RequestLifecycle {
    store: SharedStore,
    media: Arc<dyn MediaStore>,
    events: Arc<EventBus>,
}

impl RequestLifecycle {
    pub fn new(store: SharedStore, media: Arc<dyn MediaStore>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            media,
            events,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            Arc::clone(&state.media),
            Arc::clone(&state.event_bus),
        )
    }

    /// Create a `pending` request for `requester_id`.
    ///
    /// Validation runs first and has no effects. A photo, when present, is
    /// compressed and uploaded before the record is written; any failure
    /// there aborts the submission.
    pub async fn submit(
        &self,
        requester_id: DbId,
        draft: SubmissionDraft,
        photo: Option<PhotoUpload>,
    ) -> AppResult<ServiceRequest> {
        let valid = draft.validate()?;
        let requester = self.account(requester_id).await?;

        let photo_url = match photo.filter(|p| !p.bytes.is_empty()) {
            Some(photo) => Some(self.store_photo(requester_id, photo).await?),
            None => None,
        };

        let input = CreateServiceRequest {
            requester_id,
            requester_name: requester.name,
            description: valid.description,
            location: valid.location,
            coordinates: Some(valid.coordinates),
            photo_url,
        };
        let created = self.store.create_request(&input).await.map_err(|e| {
            tracing::error!(requester_id, error = %e, "Failed to create request");
            e
        })?;

        tracing::info!(request_id = created.id, requester_id, "Request submitted");
        self.events.publish(
            PlatformEvent::new(EVENT_REQUEST_CREATED)
                .with_source(ENTITY_SERVICE_REQUEST, created.id)
                .with_actor(requester_id)
                .with_payload(json!({
                    "requester_id": requester_id,
                    "has_photo": created.photo_url.is_some(),
                })),
        );
        Ok(created)
    }

    /// Assign a pending request to a worker.
    pub async fn assign(
        &self,
        admin_id: DbId,
        request_id: DbId,
        worker_id: DbId,
    ) -> AppResult<ServiceRequest> {
        let worker = self
            .store
            .find_user(worker_id)
            .await?
            .filter(|u| u.parsed_role() == Some(Role::Worker))
            .ok_or(CoreError::NotFound {
                entity: "Worker",
                id: worker_id,
            })?;

        let current = self.find(request_id).await?;
        current
            .status
            .ensure_can_advance_to(RequestStatus::Assigned)?;

        let patch = RequestPatch::Assign {
            assignee_id: worker.id,
            assignee_name: worker.name.clone(),
        };
        let updated = self.write(request_id, &patch).await?;

        tracing::info!(request_id, worker_id, admin_id, "Request assigned");
        self.events.publish(
            PlatformEvent::new(EVENT_REQUEST_ASSIGNED)
                .with_source(ENTITY_SERVICE_REQUEST, request_id)
                .with_actor(admin_id)
                .with_payload(json!({
                    "requester_id": updated.requester_id,
                    "assignee_id": worker.id,
                    "assignee_name": worker.name,
                })),
        );
        Ok(updated)
    }

    /// Mark an assigned request completed. Only its assignee may do this.
    pub async fn complete(&self, worker_id: DbId, request_id: DbId) -> AppResult<ServiceRequest> {
        let current = self.find(request_id).await?;
        current
            .status
            .ensure_can_advance_to(RequestStatus::Completed)?;
        if current.assignee_id != Some(worker_id) {
            return Err(CoreError::Forbidden(
                "Only the assigned worker can complete this request".into(),
            )
            .into());
        }

        let updated = self.write(request_id, &RequestPatch::Complete).await?;

        tracing::info!(request_id, worker_id, "Request completed");
        self.events.publish(
            PlatformEvent::new(EVENT_REQUEST_COMPLETED)
                .with_source(ENTITY_SERVICE_REQUEST, request_id)
                .with_actor(worker_id)
                .with_payload(json!({
                    "requester_id": updated.requester_id,
                    "assignee_id": worker_id,
                })),
        );
        Ok(updated)
    }

    async fn account(&self, user_id: DbId) -> AppResult<User> {
        self.store.find_user(user_id).await?.ok_or_else(|| {
            CoreError::Unauthorized("Account no longer exists".into()).into()
        })
    }

    async fn find(&self, request_id: DbId) -> AppResult<ServiceRequest> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| CoreError::request_not_found(request_id).into())
    }

    async fn write(&self, request_id: DbId, patch: &RequestPatch) -> AppResult<ServiceRequest> {
        match self.store.update_request(request_id, patch).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => match self.store.find_request(request_id).await? {
                Some(current) => {
                    tracing::warn!(
                        request_id,
                        status = %current.status,
                        ?patch,
                        "Stale write refused"
                    );
                    Err(CoreError::Conflict(format!(
                        "Request {request_id} is already {}",
                        current.status
                    ))
                    .into())
                }
                None => Err(CoreError::request_not_found(request_id).into()),
            },
            Err(e) => {
                tracing::error!(request_id, ?patch, error = %e, "Failed to update request");
                Err(e.into())
            }
        }
    }

    /// Compress and upload, relaying progress to the requester.
    async fn store_photo(&self, requester_id: DbId, photo: PhotoUpload) -> AppResult<String> {
        let compressed = photo::compress_blocking(photo.bytes)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let path = photo_object_path(requester_id, Utc::now().timestamp_millis());
        let task = self.media.begin_upload(&path, compressed)?;

        let events = Arc::clone(&self.events);
        let progress_path = path.clone();
        let url = task
            .run(move |progress: UploadProgress| {
                events.publish(
                    PlatformEvent::new(EVENT_UPLOAD_PROGRESS)
                        .with_actor(requester_id)
                        .with_payload(json!({
                            "path": progress_path,
                            "percent": progress.percent(),
                            "bytes_transferred": progress.bytes_transferred,
                            "total_bytes": progress.total_bytes,
                        })),
                );
            })
            .await?;

        tracing::debug!(requester_id, %path, "Photo uploaded");
        Ok(url)
    }
}
