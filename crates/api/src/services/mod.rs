//! Domain services sitting between handlers and the store.

pub mod lifecycle;
pub mod photo;

pub use lifecycle::{PhotoUpload, RequestLifecycle};
