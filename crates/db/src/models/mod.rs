//! Entity models and write DTOs.

pub mod request;
pub mod user;
