//! The document store abstraction.
//!
//! A [`Store`] owns two collections -- users and pickup requests -- and a
//! change feed. Every successful write publishes a [`StoreChange`] so live
//! queries can re-evaluate; readers never see partial writes.

use std::sync::Arc;

use async_trait::async_trait;
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::models::request::{CreateServiceRequest, RequestFilter, RequestPatch, ServiceRequest};
use crate::models::user::{CreateUser, User};

/// Capacity of the change-feed broadcast channel.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// A change notification from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// A request was created or updated.
    Request(DbId),
    /// A user was created or updated.
    User(DbId),
    /// Notifications may have been lost; every view must re-evaluate.
    Resync,
}

impl StoreChange {
    pub fn touches_requests(self) -> bool {
        matches!(self, StoreChange::Request(_) | StoreChange::Resync)
    }

    pub fn touches_users(self) -> bool {
        matches!(self, StoreChange::User(_) | StoreChange::Resync)
    }
}

/// The identity collection.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a user. Fails with a duplicate error if the email is taken.
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: DbId) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// All users holding `role`, ordered by name.
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
}

/// The pickup request collection.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new `pending` request and return it with store-assigned
    /// id and timestamps.
    async fn create_request(
        &self,
        input: &CreateServiceRequest,
    ) -> Result<ServiceRequest, StoreError>;

    async fn find_request(&self, id: DbId) -> Result<Option<ServiceRequest>, StoreError>;

    /// Apply `patch` in one write and refresh `updated_at`.
    ///
    /// Returns `None` if no request with `id` exists, or if the patch does
    /// not [apply](RequestPatch::applies_to) to its current status. Otherwise
    /// concurrent patches resolve last-write-wins.
    async fn update_request(
        &self,
        id: DbId,
        patch: &RequestPatch,
    ) -> Result<Option<ServiceRequest>, StoreError>;

    /// All requests matching `filter`, in `filter.order` when set.
    async fn query_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<ServiceRequest>, StoreError>;

    /// Subscribe to the change feed. Only changes after this call are seen.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Both collections behind one handle.
pub trait Store: RequestStore + UserDirectory {}

impl<T: RequestStore + UserDirectory + ?Sized> Store for T {}

/// The store as shared across the application.
pub type SharedStore = Arc<dyn Store>;
