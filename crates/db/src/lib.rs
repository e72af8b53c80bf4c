//! Storage layer: the request/user document store and the media store.
//!
//! - [`store`] -- the [`Store`](store::Store) abstraction every caller uses.
//! - [`postgres`] -- PostgreSQL implementation with `LISTEN/NOTIFY` change feeds.
//! - [`memory`] -- in-process implementation with identical semantics.
//! - [`media`] -- object storage for request photos.

pub mod error;
pub mod media;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{RequestStore, SharedStore, Store, StoreChange, UserDirectory};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
