//! PostgreSQL repositories, one per table.

pub mod request_repo;
pub mod user_repo;

pub use request_repo::RequestRepo;
pub use user_repo::UserRepo;
