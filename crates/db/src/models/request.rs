//! Pickup request model, write DTOs, and query filters.

use std::cmp::Reverse;

use curbside_core::request::RequestStatus;
use curbside_core::types::{Coordinates, DbId, Timestamp};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// A pickup request as stored in the `service_requests` collection.
///
/// `requester_name` and `assignee_name` are snapshots taken at write time,
/// not live references to the user record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRequest {
    pub id: DbId,
    pub requester_id: DbId,
    pub requester_name: String,
    pub description: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub photo_url: Option<String>,
    pub status: RequestStatus,
    pub assignee_id: Option<DbId>,
    pub assignee_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl<'r> FromRow<'r, PgRow> for ServiceRequest {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status_name: String = row.try_get("status")?;
        let status =
            RequestStatus::from_name(&status_name).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "status".into(),
                source: format!("unknown request status '{status_name}'").into(),
            })?;

        let latitude: Option<f64> = row.try_get("latitude")?;
        let longitude: Option<f64> = row.try_get("longitude")?;
        let coordinates = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            requester_id: row.try_get("requester_id")?,
            requester_name: row.try_get("requester_name")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            coordinates,
            photo_url: row.try_get("photo_url")?,
            status,
            assignee_id: row.try_get("assignee_id")?,
            assignee_name: row.try_get("assignee_name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for creating a request. Status, assignee and timestamps are set by
/// the store.
#[derive(Debug, Clone)]
pub struct CreateServiceRequest {
    pub requester_id: DbId,
    pub requester_name: String,
    pub description: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub photo_url: Option<String>,
}

/// Field-level update applied in a single write. The store also refreshes
/// `updated_at` from its own clock.
///
/// Stores apply patches unconditionally (last write wins); status checks
/// belong to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPatch {
    /// Set the assignee pair and move to `assigned`.
    Assign {
        assignee_id: DbId,
        assignee_name: String,
    },
    /// Move to `completed`.
    Complete,
}

impl RequestPatch {
    /// Status the record holds after the patch is applied.
    pub fn target_status(&self) -> RequestStatus {
        match self {
            RequestPatch::Assign { .. } => RequestStatus::Assigned,
            RequestPatch::Complete => RequestStatus::Completed,
        }
    }

    /// Whether the patch may be written over a record in `current`.
    ///
    /// Writes are last-write-wins except that nothing reopens a completed
    /// request.
    pub fn applies_to(&self, current: RequestStatus) -> bool {
        match self {
            RequestPatch::Assign { .. } => current != RequestStatus::Completed,
            RequestPatch::Complete => true,
        }
    }
}

/// Sort order for a request query. Ties break on id, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrder {
    CreatedDesc,
    UpdatedDesc,
}

impl RequestOrder {
    pub fn sort(self, requests: &mut [ServiceRequest]) {
        match self {
            RequestOrder::CreatedDesc => {
                requests.sort_by_key(|r| (Reverse(r.created_at), Reverse(r.id)));
            }
            RequestOrder::UpdatedDesc => {
                requests.sort_by_key(|r| (Reverse(r.updated_at), Reverse(r.id)));
            }
        }
    }
}

/// Equality filter over request fields. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilter {
    pub requester_id: Option<DbId>,
    pub assignee_id: Option<DbId>,
    pub status: Option<RequestStatus>,
    pub order: Option<RequestOrder>,
}

impl RequestFilter {
    /// Every request, newest first.
    pub fn all_newest_first() -> Self {
        Self {
            order: Some(RequestOrder::CreatedDesc),
            ..Self::default()
        }
    }

    pub fn requested_by(requester_id: DbId) -> Self {
        Self {
            requester_id: Some(requester_id),
            ..Self::default()
        }
    }

    pub fn assigned_to(assignee_id: DbId, status: RequestStatus) -> Self {
        Self {
            assignee_id: Some(assignee_id),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &ServiceRequest) -> bool {
        self.requester_id.is_none_or(|id| request.requester_id == id)
            && self
                .assignee_id
                .is_none_or(|id| request.assignee_id == Some(id))
            && self.status.is_none_or(|s| request.status == s)
    }
}
