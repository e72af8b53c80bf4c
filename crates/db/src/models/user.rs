//! User entity model and DTOs.

use curbside_core::roles::Role;
use curbside_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` collection.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] or [`WorkerSummary`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    /// Stored role name. Kept as text so unknown roles survive a read.
    pub role: String,
    pub created_at: Timestamp,
}

impl User {
    /// Typed role, or `None` when the stored name is not a known role.
    pub fn parsed_role(&self) -> Option<Role> {
        Role::from_name(&self.role)
    }
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        }
    }
}

/// A field worker as listed to administrators when assigning requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    pub id: DbId,
    pub name: String,
    pub email: String,
}

impl From<&User> for WorkerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}
