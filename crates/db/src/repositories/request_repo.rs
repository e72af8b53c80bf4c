//! Repository for the `service_requests` table.

use curbside_core::request::RequestStatus;
use curbside_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::request::{
    CreateServiceRequest, RequestFilter, RequestOrder, RequestPatch, ServiceRequest,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, requester_id, requester_name, description, location, \
                       latitude, longitude, photo_url, status, assignee_id, assignee_name, \
                       created_at, updated_at";

/// Provides create, patch and filtered listing for pickup requests.
pub struct RequestRepo;

impl RequestRepo {
    /// Insert a new `pending` request. `updated_at` starts equal to `created_at`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateServiceRequest,
    ) -> Result<ServiceRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO service_requests
                (requester_id, requester_name, description, location,
                 latitude, longitude, photo_url, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(input.requester_id)
            .bind(&input.requester_name)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.coordinates.map(|c| c.latitude))
            .bind(input.coordinates.map(|c| c.longitude))
            .bind(&input.photo_url)
            .bind(RequestStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a request by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM service_requests WHERE id = $1");
        sqlx::query_as::<_, ServiceRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a patch in a single `UPDATE`. Returns `None` if the row does not
    /// exist or the patch does not apply to it.
    ///
    /// Concurrent assignments of a pending request both succeed and the later
    /// one persists, but an assignment never lands on a completed row.
    pub async fn apply_patch(
        pool: &PgPool,
        id: DbId,
        patch: &RequestPatch,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        match patch {
            RequestPatch::Assign {
                assignee_id,
                assignee_name,
            } => {
                let query = format!(
                    "UPDATE service_requests SET
                        assignee_id = $2,
                        assignee_name = $3,
                        status = $4,
                        updated_at = GREATEST(clock_timestamp(), created_at)
                     WHERE id = $1 AND status <> $5
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, ServiceRequest>(&query)
                    .bind(id)
                    .bind(assignee_id)
                    .bind(assignee_name)
                    .bind(RequestStatus::Assigned.as_str())
                    .bind(RequestStatus::Completed.as_str())
                    .fetch_optional(pool)
                    .await
            }
            RequestPatch::Complete => {
                let query = format!(
                    "UPDATE service_requests SET
                        status = $2,
                        updated_at = GREATEST(clock_timestamp(), created_at)
                     WHERE id = $1
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, ServiceRequest>(&query)
                    .bind(id)
                    .bind(RequestStatus::Completed.as_str())
                    .fetch_optional(pool)
                    .await
            }
        }
    }

    /// List requests matching `filter`. Without an order, rows come back by id.
    pub async fn list(
        pool: &PgPool,
        filter: &RequestFilter,
    ) -> Result<Vec<ServiceRequest>, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM service_requests WHERE TRUE"));

        if let Some(requester_id) = filter.requester_id {
            builder.push(" AND requester_id = ").push_bind(requester_id);
        }
        if let Some(assignee_id) = filter.assignee_id {
            builder.push(" AND assignee_id = ").push_bind(assignee_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        builder.push(match filter.order {
            Some(RequestOrder::CreatedDesc) => " ORDER BY created_at DESC, id DESC",
            Some(RequestOrder::UpdatedDesc) => " ORDER BY updated_at DESC, id DESC",
            None => " ORDER BY id",
        });

        builder
            .build_query_as::<ServiceRequest>()
            .fetch_all(pool)
            .await
    }
}
