//! Domain error taxonomy shared by every layer above the core.

use crate::types::DbId;

/// A domain-level failure. The HTTP layer maps each variant to a status code.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The addressed record does not exist.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Input rejected before any side effect; the message is user-facing.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The record is not in a state that allows the operation, or a unique
    /// value (such as an account email) is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::Validation`] with a user-facing message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a missing pickup request.
    pub fn request_not_found(id: DbId) -> Self {
        Self::NotFound {
            entity: "ServiceRequest",
            id,
        }
    }
}
