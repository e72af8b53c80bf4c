//! The closed set of user roles.
//!
//! Role names are stored on the user record and embedded in access tokens as
//! plain strings. [`Role`] is the typed form; parse once at the boundary and
//! match exhaustively afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_REQUESTER: &str = "requester";
pub const ROLE_WORKER: &str = "worker";
pub const ROLE_ADMIN: &str = "admin";

/// Legacy names still found in older accounts.
const LEGACY_REQUESTER: &str = "resident";
const LEGACY_WORKER: &str = "cleaner";

/// Who a user is, and therefore which view of the request collection they get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Submits pickup requests and sees only their own.
    #[serde(alias = "resident")]
    Requester,
    /// Field worker; sees and completes requests assigned to them.
    #[serde(alias = "cleaner")]
    Worker,
    /// Sees everything and assigns pending requests to workers.
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Requester, Role::Worker, Role::Admin];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Requester => ROLE_REQUESTER,
            Role::Worker => ROLE_WORKER,
            Role::Admin => ROLE_ADMIN,
        }
    }

    /// Every stored name that parses to this role, canonical first.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Role::Requester => &[ROLE_REQUESTER, LEGACY_REQUESTER],
            Role::Worker => &[ROLE_WORKER, LEGACY_WORKER],
            Role::Admin => &[ROLE_ADMIN],
        }
    }

    /// Parse a stored role name. Returns `None` for unknown roles.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            ROLE_REQUESTER | LEGACY_REQUESTER => Some(Role::Requester),
            ROLE_WORKER | LEGACY_WORKER => Some(Role::Worker),
            ROLE_ADMIN => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_name(s).ok_or_else(|| {
            CoreError::Validation(format!(
                "Unknown role '{s}'. Must be one of: {ROLE_REQUESTER}, {ROLE_WORKER}, {ROLE_ADMIN}"
            ))
        })
    }
}
