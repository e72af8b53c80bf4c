/// Failure reported by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error from the PostgreSQL backend.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique value is already taken (e.g. an account email).
    #[error("Duplicate value: {0}")]
    Duplicate(String),
}
