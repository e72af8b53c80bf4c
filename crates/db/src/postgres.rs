//! PostgreSQL-backed [`Store`](crate::store::Store).
//!
//! Writes go through the repositories. Table triggers (see the
//! `change_notifications` migration) emit `pg_notify` on every insert and
//! update; a background task relays those notifications into the store's
//! broadcast change feed, so writes made by other processes are observed too.

use std::time::Duration;

use async_trait::async_trait;
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::models::request::{CreateServiceRequest, RequestFilter, RequestPatch, ServiceRequest};
use crate::models::user::{CreateUser, User};
use crate::repositories::{RequestRepo, UserRepo};
use crate::store::{RequestStore, StoreChange, UserDirectory, CHANGE_FEED_CAPACITY};
use crate::DbPool;

/// Channel the `service_requests` trigger notifies on.
pub const CHANNEL_REQUESTS: &str = "service_request_changes";
/// Channel the `users` trigger notifies on.
pub const CHANNEL_USERS: &str = "user_changes";

/// Back-off after a listener error before polling again.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct PgStore {
    pool: DbPool,
    changes: broadcast::Sender<StoreChange>,
    relay: JoinHandle<()>,
}

impl PgStore {
    /// Open a listener on both change channels and start relaying.
    pub async fn start(pool: DbPool) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener
            .listen_all([CHANNEL_REQUESTS, CHANNEL_USERS])
            .await?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let relay = tokio::spawn(relay_notifications(listener, changes.clone()));
        tracing::info!("Postgres change feed listening");

        Ok(Self {
            pool,
            changes,
            relay,
        })
    }
}

impl Drop for PgStore {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

/// Decode a notification into a change. Unknown channels or payloads yield `None`.
pub fn parse_notification(channel: &str, payload: &str) -> Option<StoreChange> {
    let id: DbId = payload.trim().parse().ok()?;
    match channel {
        CHANNEL_REQUESTS => Some(StoreChange::Request(id)),
        CHANNEL_USERS => Some(StoreChange::User(id)),
        _ => None,
    }
}

async fn relay_notifications(mut listener: PgListener, changes: broadcast::Sender<StoreChange>) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                match parse_notification(notification.channel(), notification.payload()) {
                    Some(change) => {
                        let _ = changes.send(change);
                    }
                    None => tracing::warn!(
                        channel = notification.channel(),
                        payload = notification.payload(),
                        "Ignoring unrecognised change notification"
                    ),
                }
            }
            Ok(None) => {
                // Connection dropped; the listener reconnects on the next
                // call but anything sent meanwhile is gone.
                tracing::warn!("Change feed connection lost, requesting resync");
                let _ = changes.send(StoreChange::Resync);
            }
            Err(e) => {
                tracing::error!(error = %e, "Change feed listener error");
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        Ok(UserRepo::list_by_role(&self.pool, role.names()).await?)
    }
}

#[async_trait]
impl RequestStore for PgStore {
    async fn create_request(
        &self,
        input: &CreateServiceRequest,
    ) -> Result<ServiceRequest, StoreError> {
        Ok(RequestRepo::create(&self.pool, input).await?)
    }

    async fn find_request(&self, id: DbId) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(RequestRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update_request(
        &self,
        id: DbId,
        patch: &RequestPatch,
    ) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(RequestRepo::apply_patch(&self.pool, id, patch).await?)
    }

    async fn query_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<ServiceRequest>, StoreError> {
        Ok(RequestRepo::list(&self.pool, filter).await?)
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
