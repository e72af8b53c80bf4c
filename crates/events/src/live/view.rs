//! Per-role view projections.

use curbside_core::request::{RequestStatus, StatusCounts};
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use curbside_db::models::request::{RequestFilter, RequestOrder, ServiceRequest};
use curbside_db::models::user::WorkerSummary;
use curbside_db::{Store, StoreChange, StoreError};
use serde::Serialize;

/// Which slice of the store a subscriber sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    /// Requests the user submitted.
    Requester { user_id: DbId },
    /// Requests currently assigned to the user.
    Worker { user_id: DbId },
    /// Everything, plus the worker roster.
    Admin,
}

impl ViewScope {
    pub fn for_role(role: Role, user_id: DbId) -> Self {
        match role {
            Role::Requester => ViewScope::Requester { user_id },
            Role::Worker => ViewScope::Worker { user_id },
            Role::Admin => ViewScope::Admin,
        }
    }

    /// Store-side filter for the request half of the view.
    pub fn filter(&self) -> RequestFilter {
        match *self {
            ViewScope::Requester { user_id } => RequestFilter::requested_by(user_id),
            ViewScope::Worker { user_id } => {
                RequestFilter::assigned_to(user_id, RequestStatus::Assigned)
            }
            ViewScope::Admin => RequestFilter::all_newest_first(),
        }
    }

    /// Whether `change` can alter this view.
    pub fn watches(&self, change: StoreChange) -> bool {
        match self {
            ViewScope::Admin => change.touches_requests() || change.touches_users(),
            _ => change.touches_requests(),
        }
    }

    /// Evaluate the view in full against `store`.
    pub async fn project(&self, store: &dyn Store) -> Result<Snapshot, StoreError> {
        let mut rows = store.query_requests(&self.filter()).await?;
        match *self {
            ViewScope::Requester { .. } => {
                RequestOrder::CreatedDesc.sort(&mut rows);
                Ok(Snapshot::Requester {
                    requests: with_directions(rows),
                })
            }
            ViewScope::Worker { .. } => {
                RequestOrder::UpdatedDesc.sort(&mut rows);
                Ok(Snapshot::Worker {
                    requests: with_directions(rows),
                })
            }
            ViewScope::Admin => {
                let workers = store
                    .list_users_by_role(Role::Worker)
                    .await?
                    .iter()
                    .map(WorkerSummary::from)
                    .collect();
                let stats = StatusCounts::tally(rows.iter().map(|r| r.status));
                Ok(Snapshot::Admin {
                    requests: with_directions(rows),
                    workers,
                    stats,
                })
            }
        }
    }
}

/// A request as shown in a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: ServiceRequest,
    /// Turn-by-turn link to the pickup spot.
    pub directions_url: Option<String>,
}

impl From<ServiceRequest> for RequestView {
    fn from(request: ServiceRequest) -> Self {
        let directions_url = request.coordinates.map(|c| c.directions_url());
        Self {
            request,
            directions_url,
        }
    }
}

fn with_directions(rows: Vec<ServiceRequest>) -> Vec<RequestView> {
    rows.into_iter().map(RequestView::from).collect()
}

/// One full evaluation of a view. Each delivery replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Snapshot {
    Requester {
        requests: Vec<RequestView>,
    },
    Worker {
        requests: Vec<RequestView>,
    },
    Admin {
        requests: Vec<RequestView>,
        workers: Vec<WorkerSummary>,
        stats: StatusCounts,
    },
}

impl Snapshot {
    pub fn requests(&self) -> &[RequestView] {
        match self {
            Snapshot::Requester { requests }
            | Snapshot::Worker { requests }
            | Snapshot::Admin { requests, .. } => requests,
        }
    }
}
