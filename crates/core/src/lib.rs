//! Domain core for the Curbside pickup-request tracker.
//!
//! Pure types and rules with no I/O: roles, the request status machine,
//! coordinates and location labels, submission validation, and the shared
//! [`error::CoreError`] taxonomy.

pub mod error;
pub mod request;
pub mod roles;
pub mod types;
