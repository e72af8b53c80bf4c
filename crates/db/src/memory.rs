//! In-process [`Store`](crate::store::Store) for development and tests.
//!
//! Mirrors the PostgreSQL semantics: store-assigned ids and timestamps,
//! last-write-wins patches that never reopen a completed request, unique emails, and one change
//! notification per successful write.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use curbside_core::request::RequestStatus;
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use tokio::sync::{broadcast, RwLock};

use crate::error::StoreError;
use crate::models::request::{CreateServiceRequest, RequestFilter, RequestPatch, ServiceRequest};
use crate::models::user::{CreateUser, User};
use crate::store::{RequestStore, StoreChange, UserDirectory, CHANGE_FEED_CAPACITY};

#[derive(Default)]
struct Collections {
    next_user_id: DbId,
    next_request_id: DbId,
    users: BTreeMap<DbId, User>,
    requests: BTreeMap<DbId, ServiceRequest>,
}

pub struct MemoryStore {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            collections: RwLock::new(Collections::default()),
            changes,
        }
    }

    fn notify(&self, change: StoreChange) {
        // No receivers is fine: nobody is watching.
        let _ = self.changes.send(change);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        let user = {
            let mut c = self.collections.write().await;
            if c.users.values().any(|u| u.email == input.email) {
                return Err(StoreError::Duplicate(format!(
                    "An account with email {} already exists",
                    input.email
                )));
            }
            c.next_user_id += 1;
            let user = User {
                id: c.next_user_id,
                name: input.name.clone(),
                email: input.email.clone(),
                password_hash: input.password_hash.clone(),
                role: input.role.clone(),
                created_at: Utc::now(),
            };
            c.users.insert(user.id, user.clone());
            user
        };
        self.notify(StoreChange::User(user.id));
        Ok(user)
    }

    async fn find_user(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(self.collections.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let c = self.collections.read().await;
        Ok(c.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let c = self.collections.read().await;
        let mut users: Vec<User> = c
            .users
            .values()
            .filter(|u| u.parsed_role() == Some(role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create_request(
        &self,
        input: &CreateServiceRequest,
    ) -> Result<ServiceRequest, StoreError> {
        let request = {
            let mut c = self.collections.write().await;
            c.next_request_id += 1;
            let now = Utc::now();
            let request = ServiceRequest {
                id: c.next_request_id,
                requester_id: input.requester_id,
                requester_name: input.requester_name.clone(),
                description: input.description.clone(),
                location: input.location.clone(),
                coordinates: input.coordinates,
                photo_url: input.photo_url.clone(),
                status: RequestStatus::Pending,
                assignee_id: None,
                assignee_name: None,
                created_at: now,
                updated_at: now,
            };
            c.requests.insert(request.id, request.clone());
            request
        };
        self.notify(StoreChange::Request(request.id));
        Ok(request)
    }

    async fn find_request(&self, id: DbId) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(self.collections.read().await.requests.get(&id).cloned())
    }

    async fn update_request(
        &self,
        id: DbId,
        patch: &RequestPatch,
    ) -> Result<Option<ServiceRequest>, StoreError> {
        let updated = {
            let mut c = self.collections.write().await;
            let Some(request) = c.requests.get_mut(&id) else {
                return Ok(None);
            };
            if !patch.applies_to(request.status) {
                return Ok(None);
            }
            match patch {
                RequestPatch::Assign {
                    assignee_id,
                    assignee_name,
                } => {
                    request.assignee_id = Some(*assignee_id);
                    request.assignee_name = Some(assignee_name.clone());
                }
                RequestPatch::Complete => {}
            }
            request.status = patch.target_status();
            request.updated_at = Utc::now().max(request.created_at);
            request.clone()
        };
        self.notify(StoreChange::Request(id));
        Ok(Some(updated))
    }

    async fn query_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        let mut rows: Vec<ServiceRequest> = {
            let c = self.collections.read().await;
            c.requests
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect()
        };
        if let Some(order) = filter.order {
            order.sort(&mut rows);
        }
        Ok(rows)
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
